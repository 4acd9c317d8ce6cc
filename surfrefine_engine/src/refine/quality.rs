// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use float_ord::FloatOrd;

use crate::prelude::*;

/// Quality assigned to edges that must not be split.
pub const PREVENT_SPLIT_QUALITY: f64 = 0.0;
/// Quality assigned to edges that must be split regardless of curvature.
pub const FORCE_SPLIT_QUALITY: f64 = 1e9;
/// Edges shorter than this multiple of the minimum allowed edge length are
/// too short to split.
pub const MIN_SPLIT_LENGTH_FACTOR: f64 = 1.5;
/// An edge counts as "long" within a triangle when it exceeds this fraction
/// of the triangle's longest edge.
pub const LONG_EDGE_FRACTION: f64 = 0.8;
/// The included-angle rule only applies below this aspect ratio.
pub const NEAR_REGULAR_ASPECT_LIMIT: f64 = 3.0;
/// Radius reported when no curvature information is available. Large enough
/// that the resulting subtension is effectively zero.
pub const NO_CURVATURE_RADIUS: f64 = 1e9;

/// Euclidean distance between two points.
pub fn pt_dist(pt1: DVec3, pt2: DVec3) -> f64 {
    pt1.distance(pt2)
}

/// Arc sector angle (degrees) subtended by an edge of the given length on a
/// circle of the given radius.
pub fn curvature_spanned_by_edge_length(edge_length: f64, rad_of_curvature: f64) -> f64 {
    360.0 * edge_length / (std::f64::consts::TAU * rad_of_curvature)
}

/// Cosine of the angle between two vectors.
pub fn vdot(v1: DVec3, v2: DVec3) -> f64 {
    v1.dot(v2) / v1.length() / v2.length()
}

/// Cosine of the minimum included angle of the triangle, i.e. the maximum
/// cosine among its three vertex angles.
pub fn tri_min_incl_cos_angle(pt1: DVec3, pt2: DVec3, pt3: DVec3) -> f64 {
    let at1 = vdot(pt2 - pt1, pt3 - pt1);
    let at2 = vdot(pt3 - pt2, pt1 - pt2);
    let at3 = vdot(pt2 - pt3, pt1 - pt3);
    at1.max(at2).max(at3)
}

/// Aspect ratio (longest edge over shortest edge) of the triangle, together
/// with the two extreme edge lengths.
pub fn tri_aspect_ratio(pt1: DVec3, pt2: DVec3, pt3: DVec3) -> (f64, f64, f64) {
    let mut min_len = f64::MAX;
    let mut max_len: f64 = -1.0;
    for len in [
        pt_dist(pt1, pt2),
        pt_dist(pt2, pt3),
        pt_dist(pt1, pt3),
    ] {
        min_len = min_len.min(len);
        max_len = max_len.max(len);
    }
    (max_len / min_len, min_len, max_len)
}

pub fn face_aspect_ratio(mesh: &TriMesh, face: &Face) -> (f64, f64, f64) {
    let nodes = face.nodes();
    tri_aspect_ratio(
        mesh.position(nodes[0]),
        mesh.position(nodes[1]),
        mesh.position(nodes[2]),
    )
}

pub fn face_min_included_angle_cosine(mesh: &TriMesh, face: &Face) -> f64 {
    let nodes = face.nodes();
    tri_min_incl_cos_angle(
        mesh.position(nodes[0]),
        mesh.position(nodes[1]),
        mesh.position(nodes[2]),
    )
}

/// The face vertex opposite the edge, or None when the face does not have
/// one (which means the topology is corrupt).
pub fn face_apex(face: &Face, edge: &Edge) -> Option<PointId> {
    face.nodes()
        .iter_cpy()
        .find(|&n| n != edge.nodes[0] && n != edge.nodes[1])
}

/// Minimum radius of curvature of the geometry along an edge, probing every
/// distinct geometry group the edge's sheet face-edge records reference.
/// Edges with no usable records (or failing samplers) report
/// [`NO_CURVATURE_RADIUS`].
pub fn compute_edge_min_radius_of_curvature(
    mesh: &TriMesh,
    geometry: &GeometryRegistry,
    model: &MeshModel,
    edge: &Edge,
) -> f64 {
    let a = edge.nodes[0].one_based();
    let b = edge.nodes[1].one_based();

    // Group candidate records by Gref; one curvature probe per group.
    let mut to_check: BTreeMap<i64, &EdgeRecord> = BTreeMap::new();
    for sheet in &model.sheets {
        if let Some(record) = sheet.find_face_edge_by_inds(a, b) {
            to_check.insert(record.topo.gref, record);
        }
    }

    let p1 = mesh.position(edge.nodes[0]);
    let p2 = mesh.position(edge.nodes[1]);
    let mut min_radius = NO_CURVATURE_RADIUS;
    for record in to_check.values() {
        match edge_radius_of_curvature(geometry, record, p1, p2) {
            Ok(radius) => min_radius = min_radius.min(radius),
            // Curvature is undefined for this group; not an error for the
            // edge as a whole.
            Err(_) => continue,
        }
    }
    min_radius
}

/// A queue entry: an edge plus its score. Higher quality means more urgent
/// to split.
#[derive(Debug, Clone, Copy)]
pub struct EdgeQual {
    pub edge: EdgeId,
    pub edge_len: f64,
    pub quality: f64,
}

impl EdgeQual {
    pub fn new(edge: EdgeId) -> Self {
        Self {
            edge,
            edge_len: 1e9,
            quality: 0.0,
        }
    }

    /// Score the edge. Mesh-shape constraints are checked first (they can
    /// force or prevent a split outright); only edges passing them are
    /// scored by geometry curvature subtension.
    pub fn compute_quality(
        &mut self,
        mesh: &TriMesh,
        geometry: &GeometryRegistry,
        model: &MeshModel,
    ) {
        self.quality = PREVENT_SPLIT_QUALITY;

        let edge = mesh[self.edge];
        self.edge_len = mesh.edge_length(&edge);
        if self.edge_len < MIN_SPLIT_LENGTH_FACTOR * mesh.constraints.min_edge_length {
            // edge is too short to split
            return;
        }

        for face_id in edge.faces.iter_cpy().flatten() {
            let face = &mesh[face_id];
            debug_assert!(
                face_apex(face, &edge).is_some(),
                "face {face_id:?} has no vertex opposite edge {:?}",
                edge.nodes
            );

            let (aspect_ratio, _min_len, max_len) = face_aspect_ratio(mesh, face);
            if aspect_ratio > mesh.constraints.max_aspect_ratio
                && self.edge_len > LONG_EDGE_FRACTION * max_len
            {
                // a long edge in a triangle with high aspect ratio
                self.quality = FORCE_SPLIT_QUALITY;
                return;
            }

            if aspect_ratio < NEAR_REGULAR_ASPECT_LIMIT
                && self.edge_len > LONG_EDGE_FRACTION * max_len
            {
                let cos_angle = face_min_included_angle_cosine(mesh, face);
                if cos_angle > mesh.constraints.min_incl_angle_cosine_tol {
                    // a long edge in a triangle with poor included angle
                    self.quality = FORCE_SPLIT_QUALITY;
                    return;
                }
            }
        }

        // Passed the shape constraints; score by curvature subtension.
        let rad_of_curvature = compute_edge_min_radius_of_curvature(mesh, geometry, model, &edge);
        self.quality = curvature_spanned_by_edge_length(self.edge_len, rad_of_curvature);
    }
}

impl PartialEq for EdgeQual {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for EdgeQual {}

impl PartialOrd for EdgeQual {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Shortest edge first.
#[cfg(not(feature = "sort-by-quality"))]
impl Ord for EdgeQual {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        FloatOrd(self.edge_len).cmp(&FloatOrd(other.edge_len))
    }
}

// Best (highest) quality first.
#[cfg(feature = "sort-by-quality")]
impl Ord for EdgeQual {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        FloatOrd(other.quality).cmp(&FloatOrd(self.quality))
    }
}
