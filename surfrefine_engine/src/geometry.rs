// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

/// Closed-form geometry entities usable as a kernel without a CAD system
pub mod analytic;
pub use analytic::*;

/// Number of interior samples taken along an edge when probing curvature.
pub const NUM_CURVATURE_SAMPLES: usize = 3;

/// The result of projecting a single point onto a geometry group. Scoped to
/// one projection request.
#[derive(Debug, Clone)]
pub struct ProjectionData {
    xyz: DVec3,
    uv: DVec2,
    entity_name: String,
}

impl ProjectionData {
    pub fn new(xyz: DVec3, uv: DVec2, entity_name: String) -> Self {
        Self {
            xyz,
            uv,
            entity_name,
        }
    }

    pub fn xyz(&self) -> DVec3 {
        self.xyz
    }

    pub fn uv(&self) -> DVec2 {
        self.uv
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }
}

/// The boundary to the geometry kernel. The refinement core only ever talks
/// to geometry through this trait: closest-point projection onto a group of
/// entities, and principal curvature evaluation at a parametric location.
pub trait GeometryKernel {
    fn project_point(&self, group: &GeometryGroup, point: DVec3) -> Result<ProjectionData>;

    /// Minimum and maximum principal radius of curvature at `uv` on the
    /// named entity.
    fn eval_radius_of_curvature(&self, uv: DVec2, entity_name: &str) -> Result<(f64, f64)>;
}

/// How `edge_radius_of_curvature` picks the parametric location of each
/// sample. Projecting every sample matches the observable behavior of the
/// reference implementation; interpolating ParamVerts is cheaper when both
/// endpoints are bound to the same entity, but is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurvatureSampling {
    #[default]
    ProjectEverySample,
    InterpolateParamVerts,
}

/// Closest-point projection of `point` onto the geometry group a mesh topo
/// record is constrained to. Returns the projected point and the projection
/// distance.
pub fn project_to_topo_geometry(
    geometry: &GeometryRegistry,
    gref: i64,
    point: DVec3,
) -> Result<(DVec3, f64)> {
    let kernel = geometry.active_kernel()?;
    let Some(group) = geometry.group_by_id(gref) else {
        debug_assert!(false, "missing geometry group {gref}");
        bail!("missing geometry group {gref}");
    };
    let projection = kernel
        .project_point(group, point)
        .context("point projection failed")?;
    let projected = projection.xyz();
    Ok((projected, point.distance(projected)))
}

/// Radius of curvature of the geometry along an edge, from sampling the
/// geometry at three interior parameters between the end points. Returns the
/// minimum radius seen across the samples, or an error when no sample
/// produced a curvature evaluation.
pub fn edge_radius_of_curvature(
    geometry: &GeometryRegistry,
    edge_record: &EdgeRecord,
    point1: DVec3,
    point2: DVec3,
) -> Result<f64> {
    let kernel = geometry.active_kernel()?;
    let inv_num_samples = 1.0 / (NUM_CURVATURE_SAMPLES + 1) as f64;
    let mut min_radius = f64::MAX;
    let mut got_curvature = false;

    for isam in 0..NUM_CURVATURE_SAMPLES {
        let w = (isam + 1) as f64 * inv_num_samples;

        // With parametric data on both ends of the edge and a single common
        // entity, the sample UV can be interpolated instead of projected.
        let mut interpolated = None;
        if geometry.curvature_sampling == CurvatureSampling::InterpolateParamVerts {
            if let [Some(pv0), Some(pv1)] = &edge_record.param_verts {
                if pv0.gref == pv1.gref {
                    if let Some(group) = geometry.group_by_id(pv0.gref) {
                        interpolated = Some((lerp(pv0.uv, pv1.uv, w), group));
                    }
                }
            }
        }

        let (uv, projected_entity, group) = match interpolated {
            Some((uv, group)) => (uv, None, group),
            None => {
                let Some(group) = geometry.group_by_id(edge_record.topo.gref) else {
                    bail!("missing geometry group {}", edge_record.topo.gref);
                };
                let sample_point = lerp(point1, point2, w);
                let projection = kernel
                    .project_point(group, sample_point)
                    .context("point projection failed")?;
                (
                    projection.uv(),
                    Some(projection.entity_name().to_owned()),
                    group,
                )
            }
        };

        match projected_entity {
            Some(name) => {
                if let Ok((min_r, _)) = kernel.eval_radius_of_curvature(uv, &name) {
                    if min_r < min_radius {
                        min_radius = min_r;
                        got_curvature = true;
                    }
                }
            }
            None => {
                for name in &group.entity_names {
                    if let Ok((min_r, _)) = kernel.eval_radius_of_curvature(uv, name) {
                        if min_r < min_radius {
                            min_radius = min_r;
                            got_curvature = true;
                        }
                    }
                }
            }
        }
    }

    if !got_curvature {
        bail!("radius-of-curvature evaluation failed along edge");
    }
    Ok(min_radius)
}
