// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The registry binding mesh topo entities to CAD geometry. Entities are
//! keyed by node-index tuples (1-based at this boundary, by convention) and
//! carry three tag classes: identity (ID), attribute reference (Aref) and
//! geometry reference (Gref). Strings group edges into 1-D collections,
//! sheets group face-edges and faces into 2-D collections.

use crate::prelude::*;

/// A mesh vertex enriched with parametric coordinates on a geometry entity.
#[derive(Debug, Clone, Copy)]
pub struct ParamVert {
    pub gref: i64,
    pub uv: DVec2,
}

/// The tag triple (plus name) every associativity record inherits from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopoRef {
    pub id: i64,
    pub aref: i64,
    pub gref: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct EdgeRecord {
    pub topo: TopoRef,
    pub param_verts: [Option<ParamVert>; 2],
}

impl EdgeRecord {
    pub fn new(topo: TopoRef) -> Self {
        Self {
            topo,
            param_verts: [None, None],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FaceRecord {
    pub topo: TopoRef,
}

impl FaceRecord {
    pub fn new(topo: TopoRef) -> Self {
        Self { topo }
    }
}

fn edge_key(a: i64, b: i64) -> (i64, i64) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn face_key(a: i64, b: i64, c: i64) -> (i64, i64, i64) {
    let mut key = [a, b, c];
    key.sort_unstable();
    (key[0], key[1], key[2])
}

/// A 1-D collection of edge records.
#[derive(Debug, Clone, Default)]
pub struct MeshString {
    pub name: String,
    edges: HashMap<(i64, i64), EdgeRecord>,
}

impl MeshString {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            edges: HashMap::new(),
        }
    }

    pub fn find_edge_by_inds(&self, a: i64, b: i64) -> Option<&EdgeRecord> {
        self.edges.get(&edge_key(a, b))
    }

    pub fn add_edge(&mut self, a: i64, b: i64, record: EdgeRecord) {
        self.edges.insert(edge_key(a, b), record);
    }

    /// Deleting a record that does not exist is a no-op.
    pub fn delete_edge_by_inds(&mut self, a: i64, b: i64) {
        self.edges.remove(&edge_key(a, b));
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}

/// A 2-D collection of face-edge and face records.
#[derive(Debug, Clone, Default)]
pub struct MeshSheet {
    pub name: String,
    face_edges: HashMap<(i64, i64), EdgeRecord>,
    faces: HashMap<(i64, i64, i64), FaceRecord>,
}

impl MeshSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            face_edges: HashMap::new(),
            faces: HashMap::new(),
        }
    }

    pub fn find_face_edge_by_inds(&self, a: i64, b: i64) -> Option<&EdgeRecord> {
        self.face_edges.get(&edge_key(a, b))
    }

    pub fn find_face_by_inds(&self, a: i64, b: i64, c: i64) -> Option<&FaceRecord> {
        self.faces.get(&face_key(a, b, c))
    }

    pub fn add_face_edge(&mut self, a: i64, b: i64, record: EdgeRecord) {
        self.face_edges.insert(edge_key(a, b), record);
    }

    pub fn add_face(&mut self, a: i64, b: i64, c: i64, record: FaceRecord) {
        self.faces.insert(face_key(a, b, c), record);
    }

    pub fn delete_face_edge_by_inds(&mut self, a: i64, b: i64) {
        self.face_edges.remove(&edge_key(a, b));
    }

    pub fn delete_face_by_inds(&mut self, a: i64, b: i64, c: i64) {
        self.faces.remove(&face_key(a, b, c));
    }

    pub fn num_face_edges(&self) -> usize {
        self.face_edges.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }
}

/// The model-level registry: string edges ("lowest topology"), face-edges and
/// faces, plus the string and sheet collections that repeat them.
#[derive(Debug, Clone, Default)]
pub struct MeshModel {
    pub name: String,
    edges: HashMap<(i64, i64), EdgeRecord>,
    face_edges: HashMap<(i64, i64), EdgeRecord>,
    faces: HashMap<(i64, i64, i64), FaceRecord>,
    pub strings: Vec<MeshString>,
    pub sheets: Vec<MeshSheet>,
}

impl MeshModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// String-level edge records only.
    pub fn find_string_edge_by_inds(&self, a: i64, b: i64) -> Option<&EdgeRecord> {
        self.edges.get(&edge_key(a, b))
    }

    pub fn find_face_edge_by_inds(&self, a: i64, b: i64) -> Option<&EdgeRecord> {
        self.face_edges.get(&edge_key(a, b))
    }

    /// The record of lowest topological order for the pair: a string edge
    /// when one exists (the edge lies on a curve), otherwise a face-edge.
    pub fn find_lowest_topo_edge_by_inds(&self, a: i64, b: i64) -> Option<&EdgeRecord> {
        self.find_string_edge_by_inds(a, b)
            .or_else(|| self.find_face_edge_by_inds(a, b))
    }

    pub fn find_face_by_inds(&self, a: i64, b: i64, c: i64) -> Option<&FaceRecord> {
        self.faces.get(&face_key(a, b, c))
    }

    pub fn add_edge(&mut self, a: i64, b: i64, record: EdgeRecord) {
        self.edges.insert(edge_key(a, b), record);
    }

    pub fn add_face_edge(&mut self, a: i64, b: i64, record: EdgeRecord) {
        self.face_edges.insert(edge_key(a, b), record);
    }

    pub fn add_face(&mut self, a: i64, b: i64, c: i64, record: FaceRecord) {
        self.faces.insert(face_key(a, b, c), record);
    }

    /// Remove the pair's string edge and face-edge records. Absent records
    /// are a no-op.
    pub fn delete_edge_by_inds(&mut self, a: i64, b: i64) {
        let key = edge_key(a, b);
        self.edges.remove(&key);
        self.face_edges.remove(&key);
    }

    pub fn delete_face_by_inds(&mut self, a: i64, b: i64, c: i64) {
        self.faces.remove(&face_key(a, b, c));
    }

    /// Bind every edge and face of a mesh to a single geometry group,
    /// collecting the face-edge and face records into one new sheet (and
    /// repeating them at model level). This is the shape a model constrained
    /// to one surface takes.
    pub fn bind_mesh_sheet(&mut self, mesh: &TriMesh, sheet_name: &str, gref: i64) {
        let mut sheet = MeshSheet::new(sheet_name);
        for (i, edge) in mesh.edges.iter().enumerate() {
            let record = EdgeRecord::new(TopoRef {
                id: i as i64 + 1,
                aref: 0,
                gref,
                name: String::new(),
            });
            let a = edge.nodes[0].one_based();
            let b = edge.nodes[1].one_based();
            self.add_face_edge(a, b, record.clone());
            sheet.add_face_edge(a, b, record);
        }
        for (i, face) in mesh.faces.iter().enumerate() {
            let record = FaceRecord::new(TopoRef {
                id: i as i64 + 1,
                aref: 0,
                gref,
                name: format!("face.{}", i + 1),
            });
            let nodes = face.nodes();
            let (a, b, c) = (
                nodes[0].one_based(),
                nodes[1].one_based(),
                nodes[2].one_based(),
            );
            self.add_face(a, b, c, record.clone());
            sheet.add_face(a, b, c, record);
        }
        self.sheets.push(sheet);
    }

    pub fn num_string_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_face_edges(&self) -> usize {
        self.face_edges.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }
}

/// A set of geometry entities a mesh entity can be constrained to, resolved
/// from a record's Gref.
#[derive(Debug, Clone, Default)]
pub struct GeometryGroup {
    pub gref: i64,
    pub entity_names: Vec<String>,
}

/// Geometry groups plus the active kernel. The kernel is a per-registry
/// collaborator, not process-global state.
#[derive(Default)]
pub struct GeometryRegistry {
    groups: HashMap<i64, GeometryGroup>,
    kernel: Option<Box<dyn GeometryKernel>>,
    pub curvature_sampling: CurvatureSampling,
}

impl GeometryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, group: GeometryGroup) {
        self.groups.insert(group.gref, group);
    }

    pub fn group_by_id(&self, gref: i64) -> Option<&GeometryGroup> {
        self.groups.get(&gref)
    }

    pub fn set_active_kernel(&mut self, kernel: Box<dyn GeometryKernel>) {
        self.kernel = Some(kernel);
    }

    pub fn active_kernel(&self) -> Result<&dyn GeometryKernel> {
        self.kernel
            .as_deref()
            .ok_or_else(|| anyhow!("no active geometry kernel"))
    }
}

impl std::fmt::Debug for GeometryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryRegistry")
            .field("groups", &self.groups)
            .field("has_kernel", &self.kernel.is_some())
            .field("curvature_sampling", &self.curvature_sampling)
            .finish()
    }
}

/// Top-level associativity: the geometry registry and the mesh models bound
/// to it.
#[derive(Debug, Default)]
pub struct MeshAssociativity {
    pub geometry: GeometryRegistry,
    pub models: Vec<MeshModel>,
}

impl MeshAssociativity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_model(&mut self, model: MeshModel) -> usize {
        self.models.push(model);
        self.models.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_lookup_is_order_independent() {
        let mut model = MeshModel::new("model");
        model.add_face_edge(
            2,
            7,
            EdgeRecord::new(TopoRef {
                id: 1,
                aref: 0,
                gref: 42,
                name: String::new(),
            }),
        );
        assert!(model.find_face_edge_by_inds(7, 2).is_some());
        assert!(model.find_string_edge_by_inds(7, 2).is_none());
        model.delete_edge_by_inds(7, 2);
        assert!(model.find_face_edge_by_inds(2, 7).is_none());
    }

    #[test]
    fn lowest_topo_prefers_string_edges() {
        let mut model = MeshModel::new("model");
        let sheet_rec = EdgeRecord::new(TopoRef {
            gref: 1,
            ..Default::default()
        });
        let string_rec = EdgeRecord::new(TopoRef {
            gref: 2,
            name: "curve.1".into(),
            ..Default::default()
        });
        model.add_face_edge(1, 2, sheet_rec);
        assert_eq!(model.find_lowest_topo_edge_by_inds(1, 2).unwrap().topo.gref, 1);
        model.add_edge(1, 2, string_rec);
        assert_eq!(model.find_lowest_topo_edge_by_inds(1, 2).unwrap().topo.gref, 2);
    }

    #[test]
    fn face_lookup_ignores_rotation() {
        let mut sheet = MeshSheet::new("sheet");
        sheet.add_face(3, 1, 2, FaceRecord::default());
        assert!(sheet.find_face_by_inds(1, 2, 3).is_some());
        assert!(sheet.find_face_by_inds(2, 3, 1).is_some());
        sheet.delete_face_by_inds(2, 1, 3);
        assert_eq!(sheet.num_faces(), 0);
    }
}
