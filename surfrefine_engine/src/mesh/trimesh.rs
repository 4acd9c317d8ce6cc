// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

/// Implements indexing traits so the mesh data structure can be used to access
/// point, edge or face information using ids as indices.
pub mod mesh_index_impls;

/// Type-safe wrappers over the array indices used as pointers
pub mod id_types;
pub use id_types::*;

/// The edge-split operator
pub mod edit_ops;

/// Import / Export of TriMesh data to VRML 1.0 files
pub mod vrml;

/// A mesh point. Carries no identity beyond its index.
#[derive(Debug, Clone, Copy)]
pub struct Point {
    pub r: DVec3,
}

/// An unordered pair of points plus the (up to two) faces it borders.
/// `faces[1] = None` marks a lamina (boundary) edge. The pair of nodes
/// identifies the edge; orientation of the `nodes` array is a transient
/// property that [`TriMesh::find_and_orient_edge`] aligns on demand.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub nodes: [PointId; 2],
    pub faces: [Option<FaceId>; 2],
}

impl Edge {
    pub fn new(n0: PointId, n1: PointId) -> Self {
        Self {
            nodes: [n0, n1],
            faces: [None, None],
        }
    }

    /// Node pair in ascending order. This is the edge's identity.
    pub fn sorted_nodes(&self) -> [PointId; 2] {
        let [n0, n1] = self.nodes;
        if n0 < n1 {
            [n0, n1]
        } else {
            [n1, n0]
        }
    }

    /// Reverse the edge: swaps both the node pair and the face pair.
    pub fn flip(&mut self) {
        self.nodes.swap(0, 1);
        self.faces.swap(0, 1);
    }

    pub fn is_lamina(&self) -> bool {
        self.faces[1].is_none()
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_nodes() == other.sorted_nodes()
    }
}

impl Eq for Edge {}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sorted_nodes().cmp(&other.sorted_nodes())
    }
}

/// A face with 3 or 4 nodes in cyclic order. The cyclic order encodes
/// orientation. Quads can be read from input files, but every topological
/// operation in this crate requires triangles.
#[derive(Debug, Clone)]
pub struct Face {
    nodes: [PointId; 4],
    num_nodes: usize,
}

impl Face {
    pub fn tri(a: PointId, b: PointId, c: PointId) -> Self {
        Self {
            nodes: [a, b, c, PointId(u32::MAX)],
            num_nodes: 3,
        }
    }

    pub fn from_nodes(nodes: &[PointId]) -> Result<Self> {
        match nodes {
            [a, b, c] => Ok(Self::tri(*a, *b, *c)),
            [a, b, c, d] => Ok(Self {
                nodes: [*a, *b, *c, *d],
                num_nodes: 4,
            }),
            _ => bail!("face must have 3 or 4 nodes, got {}", nodes.len()),
        }
    }

    pub fn nodes(&self) -> &[PointId] {
        &self.nodes[..self.num_nodes]
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn contains(&self, p: PointId) -> bool {
        self.nodes().contains(&p)
    }

    /// Rotate the node list so `a` and `b` end up in positions 0 and 1,
    /// preserving the cyclic order.
    ///
    /// Precondition: `a` is in the face and `b` follows it cyclically.
    /// A violation means the caller holds corrupt topology, so this panics.
    pub fn clock(&mut self, a: PointId, b: PointId) {
        let n = self.num_nodes;
        let i = self
            .nodes()
            .iter()
            .position(|&p| p == a)
            .unwrap_or_else(|| panic!("clock: {a:?} is not a node of {self:?}"));
        assert!(
            self.nodes[(i + 1) % n] == b,
            "clock: {b:?} does not follow {a:?} in {self:?}"
        );
        self.nodes[..n].rotate_left(i);
        debug_assert!(self.nodes[0] == a && self.nodes[1] == b);
    }
}

/// Shape constraints driving the force-split rules. Angles in degrees; the
/// cosine of the minimum included angle is cached at construction.
#[derive(Debug, Clone, Copy)]
pub struct MeshConstraints {
    pub min_edge_length: f64,
    pub max_aspect_ratio: f64,
    pub min_included_angle_deg: f64,
    pub min_incl_angle_cosine_tol: f64,
}

impl MeshConstraints {
    pub fn new(min_edge_length: f64, max_aspect_ratio: f64, min_included_angle_deg: f64) -> Self {
        Self {
            min_edge_length,
            max_aspect_ratio,
            min_included_angle_deg,
            min_incl_angle_cosine_tol: min_included_angle_deg.to_radians().cos(),
        }
    }
}

impl Default for MeshConstraints {
    fn default() -> Self {
        // Permissive: nothing is forced to split, nothing is too short.
        Self::new(0.0, f64::MAX, 0.0)
    }
}

/// FNV-1a over the ascending-sorted node pair. Order-independent, so both
/// orientations of an edge hash to the same key.
pub fn edge_pair_hash(a: PointId, b: PointId) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    let mut hash = FNV_OFFSET_BASIS;
    for ind in [lo.0 as u64, hi.0 as u64] {
        for byte in ind.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

/// An unstructured triangular surface mesh with contiguous point, edge and
/// face storage. Edges and faces reference points and faces by index only.
/// The edge map keys the FNV hash of each edge's unordered node pair; the
/// hash is assumed collision-free over all concurrently live pairs, and a
/// collision trips an assertion.
#[derive(Debug, Clone, Default)]
pub struct TriMesh {
    pub points: Vec<Point>,
    pub faces: Vec<Face>,
    pub edges: Vec<Edge>,
    edge_map: HashMap<u64, EdgeId>,
    pub constraints: MeshConstraints,
}

impl TriMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_constraints(&mut self, constraints: MeshConstraints) {
        self.constraints = constraints;
    }

    pub fn add_point(&mut self, r: DVec3) -> PointId {
        self.points.push(Point { r });
        PointId::from_index(self.points.len() - 1)
    }

    pub fn add_face(&mut self, face: Face) -> FaceId {
        self.faces.push(face);
        FaceId::from_index(self.faces.len() - 1)
    }

    pub fn position(&self, p: PointId) -> DVec3 {
        self[p].r
    }

    pub fn edge_length(&self, edge: &Edge) -> f64 {
        self.position(edge.nodes[0]).distance(self.position(edge.nodes[1]))
    }

    /// Append an edge and register it in the edge map.
    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId::from_index(self.edges.len());
        let hash = edge_pair_hash(edge.nodes[0], edge.nodes[1]);
        let prev = self.edge_map.insert(hash, id);
        assert!(
            prev.is_none(),
            "edge map collision adding {:?}: hash already mapped to {prev:?}",
            edge.nodes
        );
        self.edges.push(edge);
        id
    }

    /// Look up the edge with the given unordered node pair. Does not touch
    /// the edge's orientation.
    pub fn lookup_edge(&self, a: PointId, b: PointId) -> Option<EdgeId> {
        let id = *self.edge_map.get(&edge_pair_hash(a, b))?;
        let edge = &self[id];
        debug_assert!(
            edge.sorted_nodes() == Edge::new(a, b).sorted_nodes(),
            "edge map hash collision between {:?} and {:?}",
            edge.nodes,
            (a, b)
        );
        Some(id)
    }

    /// Look up an edge and flip it in place if needed so its nodes read
    /// `[a, b]`. Flipping also swaps the adjacent face slots, which is what
    /// aligns a leg edge with a clocked face during a split.
    pub fn find_and_orient_edge(&mut self, a: PointId, b: PointId) -> Option<EdgeId> {
        let id = self.lookup_edge(a, b)?;
        let edge = &mut self[id];
        if edge.nodes[0] != a {
            edge.flip();
        }
        debug_assert!(edge.nodes == [a, b]);
        Some(id)
    }

    /// Overwrite `target`'s data with `source`, keeping its slot and index.
    /// The edge map entry is relocated from the old node pair to the new one.
    /// Fails if `target` is not currently registered in the map.
    pub fn update_edge(&mut self, target: EdgeId, source: Edge) -> Result<()> {
        let old_hash = {
            let edge = &self[target];
            edge_pair_hash(edge.nodes[0], edge.nodes[1])
        };
        let Some(mapped) = self.edge_map.remove(&old_hash) else {
            bail!("update_edge: edge {target:?} is not in the edge map");
        };
        assert!(mapped == target, "edge map does not point back at {target:?}");

        self[target] = source;
        let new_hash = {
            let edge = &self[target];
            edge_pair_hash(edge.nodes[0], edge.nodes[1])
        };
        let prev = self.edge_map.insert(new_hash, target);
        assert!(
            prev.is_none(),
            "edge map collision relocating {target:?} onto {prev:?}"
        );
        Ok(())
    }

    /// Derive the edge array from the face array: three directed edges per
    /// triangle, sorted, then coalesced so that the first occurrence of a
    /// node pair contributes the inside face and a second occurrence the
    /// outside face. A third occurrence is a non-manifold error, and any
    /// non-triangle face is rejected with a diagnostic.
    pub fn create_edges(&mut self) -> Result<()> {
        for (iface, face) in self.faces.iter().enumerate() {
            if face.num_nodes() != 3 {
                bail!(
                    "create_edges: face {iface} has {} nodes; only triangles are supported",
                    face.num_nodes()
                );
            }
        }

        let mut sorted_edges = Vec::with_capacity(self.faces.len() * 3);
        for (iface, face) in self.faces.iter().enumerate() {
            let f = FaceId::from_index(iface);
            let [a, b, c] = [face.nodes[0], face.nodes[1], face.nodes[2]];
            for (n0, n1) in [(a, b), (b, c), (c, a)] {
                let mut edge = Edge::new(n0, n1);
                edge.faces[0] = Some(f);
                sorted_edges.push(edge);
            }
        }
        sorted_edges.sort();

        self.edges.clear();
        self.edge_map.clear();
        for edge in sorted_edges {
            if self.edges.last() == Some(&edge) {
                let last = self.edges.last_mut().unwrap();
                if last.faces[1].is_some() {
                    bail!(
                        "create_edges: non-manifold edge {:?} is used by more than two faces",
                        edge.sorted_nodes()
                    );
                }
                last.faces[1] = edge.faces[0];
            } else {
                self.edges.push(edge);
            }
        }

        // Second pass: the map is built only once the final indices are known.
        for (i, edge) in self.edges.iter().enumerate() {
            let hash = edge_pair_hash(edge.nodes[0], edge.nodes[1]);
            let prev = self.edge_map.insert(hash, EdgeId::from_index(i));
            assert!(
                prev.is_none(),
                "edge map collision building map for {:?}",
                edge.nodes
            );
        }
        Ok(())
    }

    /// Return true if `face` is one of the faces adjacent to `edge`.
    pub fn face_has_edge(&self, face: FaceId, edge: &Edge) -> bool {
        edge.faces.iter_cpy().any(|f| f == Some(face))
    }

    /// Face invariants: triangle arity, valid point indices, and all three
    /// boundary edges present in the edge map.
    pub fn check_faces(&self) -> Result<()> {
        let num_points = self.points.len();
        for (iface, face) in self.faces.iter().enumerate() {
            if face.num_nodes() != 3 {
                bail!("check_faces: face {iface} is not a triangle");
            }
            for &node in face.nodes() {
                if node.index() >= num_points {
                    bail!("check_faces: face {iface} references invalid point {node:?}");
                }
            }
            for (a, b) in face.nodes().iter_cpy().circular_tuple_windows() {
                if self.lookup_edge(a, b).is_none() {
                    bail!("check_faces: face {iface} edge ({a:?}, {b:?}) is not in the edge map");
                }
            }
        }
        Ok(())
    }

    /// Edge invariants: distinct valid endpoints, an inside face, and every
    /// adjacent face containing both endpoints.
    pub fn check_edges(&self) -> Result<()> {
        let num_points = self.points.len();
        for (iedge, edge) in self.edges.iter().enumerate() {
            let [n0, n1] = edge.nodes;
            if n0 == n1 {
                bail!("check_edges: edge {iedge} is degenerate at {n0:?}");
            }
            if n0.index() >= num_points || n1.index() >= num_points {
                bail!("check_edges: edge {iedge} references an invalid point");
            }
            if edge.faces[0].is_none() {
                bail!("check_edges: edge {iedge} has no inside face");
            }
            for face in edge.faces.iter_cpy().flatten() {
                let face = &self[face];
                if !(face.contains(n0) && face.contains(n1)) {
                    bail!(
                        "check_edges: edge {iedge} ({n0:?}, {n1:?}) not contained in adjacent face"
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> TriMesh {
        // Two triangles sharing the diagonal (0, 1).
        let mut mesh = TriMesh::new();
        let p0 = mesh.add_point(DVec3::ZERO);
        let p1 = mesh.add_point(DVec3::new(1.0, 1.0, 0.0));
        let p2 = mesh.add_point(DVec3::new(0.0, 1.0, 0.0));
        let p3 = mesh.add_point(DVec3::new(1.0, 0.0, 0.0));
        mesh.add_face(Face::tri(p0, p1, p2));
        mesh.add_face(Face::tri(p1, p0, p3));
        mesh.create_edges().unwrap();
        mesh
    }

    #[test]
    fn edge_hash_is_order_independent() {
        assert_eq!(
            edge_pair_hash(PointId(3), PointId(17)),
            edge_pair_hash(PointId(17), PointId(3))
        );
        assert_ne!(
            edge_pair_hash(PointId(3), PointId(17)),
            edge_pair_hash(PointId(3), PointId(16))
        );
    }

    #[test]
    fn edge_ordering_ignores_orientation_and_faces() {
        let e1 = Edge::new(PointId(5), PointId(2));
        let mut e2 = Edge::new(PointId(2), PointId(5));
        e2.faces[0] = Some(FaceId(7));
        assert_eq!(e1, e2);
        assert!(Edge::new(PointId(0), PointId(9)) < Edge::new(PointId(1), PointId(2)));
    }

    #[test]
    fn create_edges_builds_shared_diagonal() {
        let mesh = quad_mesh();
        assert_eq!(mesh.edges.len(), 5);
        let diag = mesh.lookup_edge(PointId(0), PointId(1)).unwrap();
        assert!(!mesh[diag].is_lamina());
        let boundary = mesh.lookup_edge(PointId(1), PointId(2)).unwrap();
        assert!(mesh[boundary].is_lamina());
        mesh.check_faces().unwrap();
        mesh.check_edges().unwrap();
    }

    #[test]
    fn create_edges_is_idempotent() {
        let mut mesh = quad_mesh();
        let pairs = |mesh: &TriMesh| {
            mesh.edges
                .iter()
                .map(|e| e.sorted_nodes())
                .sorted()
                .collect_vec()
        };
        let before = pairs(&mesh);
        mesh.create_edges().unwrap();
        assert_eq!(before, pairs(&mesh));
    }

    #[test]
    fn create_edges_rejects_quads() {
        let mut mesh = TriMesh::new();
        let p: Vec<_> = (0..4)
            .map(|i| mesh.add_point(DVec3::new(i as f64, 0.0, 0.0)))
            .collect();
        mesh.add_face(Face::from_nodes(&[p[0], p[1], p[2], p[3]]).unwrap());
        assert!(mesh.create_edges().is_err());
    }

    #[test]
    fn create_edges_rejects_non_manifold() {
        let mut mesh = TriMesh::new();
        let p: Vec<_> = (0..5)
            .map(|i| mesh.add_point(DVec3::new(i as f64, 0.0, 0.0)))
            .collect();
        mesh.add_face(Face::tri(p[0], p[1], p[2]));
        mesh.add_face(Face::tri(p[1], p[0], p[3]));
        mesh.add_face(Face::tri(p[0], p[1], p[4]));
        assert!(mesh.create_edges().is_err());
    }

    #[test]
    fn orient_is_idempotent_and_swaps_faces() {
        let mut mesh = quad_mesh();
        let id = mesh.find_and_orient_edge(PointId(1), PointId(0)).unwrap();
        let snapshot = mesh[id];
        let id2 = mesh.find_and_orient_edge(PointId(1), PointId(0)).unwrap();
        assert_eq!(id, id2);
        assert_eq!(mesh[id].nodes, snapshot.nodes);
        assert_eq!(mesh[id].faces, snapshot.faces);

        // Opposite orientation swaps both arrays.
        mesh.find_and_orient_edge(PointId(0), PointId(1)).unwrap();
        assert_eq!(mesh[id].nodes, [PointId(0), PointId(1)]);
        assert_eq!(mesh[id].faces, [snapshot.faces[1], snapshot.faces[0]]);
    }

    #[test]
    fn clock_rotates_to_requested_pair() {
        let mut face = Face::tri(PointId(4), PointId(8), PointId(15));
        face.clock(PointId(15), PointId(4));
        assert_eq!(face.nodes(), &[PointId(15), PointId(4), PointId(8)]);
    }

    #[test]
    #[should_panic]
    fn clock_panics_when_pair_is_not_adjacent() {
        let mut face = Face::tri(PointId(4), PointId(8), PointId(15));
        face.clock(PointId(4), PointId(15));
    }

    #[test]
    fn update_edge_relocates_map_entry() {
        let mut mesh = quad_mesh();
        let id = mesh.lookup_edge(PointId(0), PointId(1)).unwrap();
        let p4 = mesh.add_point(DVec3::new(2.0, 2.0, 0.0));
        let mut replacement = Edge::new(PointId(0), p4);
        replacement.faces = mesh[id].faces;
        mesh.update_edge(id, replacement).unwrap();
        assert!(mesh.lookup_edge(PointId(0), PointId(1)).is_none());
        assert_eq!(mesh.lookup_edge(PointId(0), p4), Some(id));
    }
}
