// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

/// Fraction of a bad edge's quality handed to its neighbors.
pub const NEIGHBOR_QUALITY_FRACTION: f64 = 0.5;
/// Rounds of expansion: 2 reaches neighbors of neighbors.
pub const NEIGHBOR_ROUNDS: usize = 2;

pub type EdgeRefineQueue = Vec<EdgeQual>;

/// Spread "bad" edge quality to neighboring edges so that splitting a bad
/// edge does not strand degenerate triangles next to it.
///
/// For every queued edge, the four leg edges (endpoint to apex, on each
/// adjacent face) are scored, boosted to at least
/// [`NEIGHBOR_QUALITY_FRACTION`] of the queued edge's quality, and enqueued
/// when they clear the threshold. A set of already-queued edge ids keeps
/// edges from being rechecked across rounds.
pub fn add_neighbors_to_queue(
    mesh: &TriMesh,
    geometry: &GeometryRegistry,
    model: &MeshModel,
    quality_threshold: f64,
    queue: &mut EdgeRefineQueue,
) {
    let mut queue_set: HashSet<EdgeId> = queue.iter().map(|entry| entry.edge).collect();

    for _round in 0..NEIGHBOR_ROUNDS {
        let num = queue.len();
        for i in 0..num {
            let parent = queue[i];
            let edge = mesh[parent.edge];

            for face_id in edge.faces.iter_cpy().flatten() {
                let face = &mesh[face_id];
                let apex = face_apex(face, &edge).unwrap_or_else(|| {
                    panic!("face {face_id:?} has no vertex opposite edge {:?}", edge.nodes)
                });

                for leg_node in edge.nodes.iter_cpy() {
                    let leg = mesh
                        .lookup_edge(leg_node, apex)
                        .unwrap_or_else(|| {
                            panic!("leg edge ({leg_node:?}, {apex:?}) missing from edge map")
                        });
                    if queue_set.contains(&leg) {
                        continue;
                    }

                    let mut entry = EdgeQual::new(leg);
                    entry.compute_quality(mesh, geometry, model);
                    entry.quality = entry
                        .quality
                        .max(parent.quality * NEIGHBOR_QUALITY_FRACTION);

                    if entry.quality > quality_threshold {
                        queue_set.insert(leg);
                        queue.push(entry);
                    }
                }
            }
        }
    }
}
