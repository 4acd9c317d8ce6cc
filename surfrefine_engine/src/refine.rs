// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::mesh::trimesh::edit_ops;
use crate::prelude::*;

/// Per-edge quality scoring
pub mod quality;
pub use quality::*;

/// The refinement queue and neighbor propagation
pub mod queue;
pub use queue::*;

/// Radii above this are considered flat when gathering resolution
/// statistics.
pub const FLAT_RADIUS_LIMIT: f64 = 1e2;

#[derive(Debug, Clone, Copy)]
pub struct RefineOptions {
    /// Edges scoring above this (degrees of subtension) are split.
    pub quality_threshold: f64,
    /// Upper bound on refinement passes. Iteration also stops as soon as a
    /// pass performs no splits.
    pub max_passes: usize,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            quality_threshold: 10.0,
            max_passes: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassStats {
    pub seeded: usize,
    pub queued: usize,
    pub splits: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RefineStats {
    pub passes: Vec<PassStats>,
    pub total_splits: usize,
}

/// Run the refinement loop: score every edge, expand the queue to neighbors,
/// then split queue entries that still score above the threshold when their
/// turn comes. Repeats until a pass performs no splits or the pass budget is
/// exhausted.
///
/// A split that fails recoverably (midpoint projection) is skipped and
/// logged; the mesh is untouched by a skipped split.
pub fn refine(
    mesh: &mut TriMesh,
    geometry: &GeometryRegistry,
    model: &mut MeshModel,
    options: &RefineOptions,
) -> Result<RefineStats> {
    let mut stats = RefineStats::default();

    for pass in 0..options.max_passes {
        let mut queue = EdgeRefineQueue::new();
        for i in 0..mesh.edges.len() {
            let mut entry = EdgeQual::new(EdgeId::from_index(i));
            entry.compute_quality(mesh, geometry, model);
            if entry.quality > options.quality_threshold {
                queue.push(entry);
            }
        }
        let seeded = queue.len();
        add_neighbors_to_queue(mesh, geometry, model, options.quality_threshold, &mut queue);
        queue.sort();
        let queued = queue.len();

        let mut pass_stats = PassStats {
            seeded,
            queued,
            ..Default::default()
        };
        let mut modified = HashSet::new();
        for i in 0..queue.len() {
            let edge_id = queue[i].edge;
            // Earlier splits may have reused this slot for a child edge, so
            // re-fetch and re-score before deciding.
            let mut entry = EdgeQual::new(edge_id);
            entry.compute_quality(mesh, geometry, model);
            if entry.quality <= options.quality_threshold {
                continue;
            }
            match edit_ops::split_edge(mesh, geometry, model, edge_id) {
                Ok(edges) => {
                    pass_stats.splits += 1;
                    modified.extend(edges);
                }
                Err(err) => {
                    log::warn!("skipping split of edge {edge_id:?}: {err:#}");
                    pass_stats.skipped += 1;
                }
            }
        }

        log::info!(
            "pass {pass}: seeded {seeded}, queued {queued}, split {}, skipped {} ({} points, {} faces)",
            pass_stats.splits,
            pass_stats.skipped,
            mesh.points.len(),
            mesh.faces.len()
        );
        log::debug!("pass {pass} touched {} edges", modified.len());

        let done = pass_stats.splits == 0;
        stats.total_splits += pass_stats.splits;
        stats.passes.push(pass_stats);
        if done {
            break;
        }
    }

    Ok(stats)
}

/// How well the mesh resolves the curvature of its geometry: subtension
/// statistics over all constrained edges.
#[derive(Debug, Clone, Default)]
pub struct GeometryResolutionStats {
    pub num_faces: usize,
    pub num_edges: usize,
    pub num_constrained_edges: usize,
    pub avg_subtension_deg: f64,
    pub max_subtension_deg: f64,
    pub max_edge_points: Option<(DVec3, DVec3)>,
    pub max_edge_length: f64,
    pub max_radius_of_curvature: f64,
}

impl GeometryResolutionStats {
    pub fn log(&self) {
        log::info!("geometry resolution statistics");
        log::info!("  number of faces: {}", self.num_faces);
        log::info!("  number of edges: {}", self.num_edges);
        log::info!("  constrained edges: {}", self.num_constrained_edges);
        log::info!(
            "  avg. edge circular arc subtension: {:.1} deg",
            self.avg_subtension_deg
        );
        log::info!(
            "  max. edge circular arc subtension: {:.1} deg",
            self.max_subtension_deg
        );
        if let Some((pt1, pt2)) = self.max_edge_points {
            log::info!("     ( {:11.4e}, {:11.4e}, {:11.4e} )", pt1.x, pt1.y, pt1.z);
            log::info!("     ( {:11.4e}, {:11.4e}, {:11.4e} )", pt2.x, pt2.y, pt2.z);
            log::info!("     edge length      : {:11.4e}", self.max_edge_length);
            log::info!("     rad. of curvature: {:11.4e}", self.max_radius_of_curvature);
        }
    }
}

/// Gather subtension statistics over every edge long enough to be a split
/// candidate and constrained to curved geometry.
pub fn geometry_resolution_stats(
    mesh: &TriMesh,
    geometry: &GeometryRegistry,
    model: &MeshModel,
) -> GeometryResolutionStats {
    let mut stats = GeometryResolutionStats {
        num_faces: mesh.faces.len(),
        num_edges: mesh.edges.len(),
        ..Default::default()
    };

    let edge_length_thresh = MIN_SPLIT_LENGTH_FACTOR * mesh.constraints.min_edge_length;
    let mut total_subtension = 0.0;
    for edge in &mesh.edges {
        let pt1 = mesh.position(edge.nodes[0]);
        let pt2 = mesh.position(edge.nodes[1]);
        let edge_length = pt_dist(pt1, pt2);
        if edge_length <= edge_length_thresh {
            continue;
        }
        let rad_of_curvature =
            compute_edge_min_radius_of_curvature(mesh, geometry, model, edge);
        if rad_of_curvature >= FLAT_RADIUS_LIMIT {
            continue;
        }
        let subtension = curvature_spanned_by_edge_length(edge_length, rad_of_curvature);
        if subtension > stats.max_subtension_deg {
            stats.max_subtension_deg = subtension;
            stats.max_edge_points = Some((pt1, pt2));
            stats.max_edge_length = edge_length;
            stats.max_radius_of_curvature = rad_of_curvature;
        }
        stats.num_constrained_edges += 1;
        total_subtension += subtension;
    }
    if stats.num_constrained_edges > 0 {
        stats.avg_subtension_deg = total_subtension / stats.num_constrained_edges as f64;
    }
    stats
}
