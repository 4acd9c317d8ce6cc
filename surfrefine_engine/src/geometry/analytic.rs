// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

/// Radius used for a direction in which an entity does not curve. Large
/// enough that the resulting subtension is negligible.
pub const FLAT_DIRECTION_RADIUS: f64 = 1e9;

/// A closed-form surface. Projection and curvature are exact, which makes
/// these usable both as a stand-in kernel for the driver and as ground truth
/// in curvature tests.
#[derive(Debug, Clone, Copy)]
pub enum AnalyticEntity {
    Sphere {
        center: DVec3,
        radius: f64,
    },
    /// Infinite cylinder around the line `origin + t * axis`.
    Cylinder {
        origin: DVec3,
        axis: DVec3,
        radius: f64,
    },
    Plane {
        origin: DVec3,
        normal: DVec3,
    },
}

impl AnalyticEntity {
    /// Closest point on the entity, along with its surface parameters.
    fn project(&self, point: DVec3) -> (DVec3, DVec2) {
        match *self {
            AnalyticEntity::Sphere { center, radius } => {
                let offset = point - center;
                let dir = if offset.length() > f64::EPSILON {
                    offset.normalize()
                } else {
                    DVec3::X
                };
                let projected = center + dir * radius;
                let uv = DVec2::new(dir.y.atan2(dir.x), dir.z.clamp(-1.0, 1.0).asin());
                (projected, uv)
            }
            AnalyticEntity::Cylinder {
                origin,
                axis,
                radius,
            } => {
                let axis = axis.normalize();
                let offset = point - origin;
                let along = offset.dot(axis);
                let radial = offset - axis * along;
                let dir = if radial.length() > f64::EPSILON {
                    radial.normalize()
                } else {
                    axis.any_orthonormal_vector()
                };
                let projected = origin + axis * along + dir * radius;
                let ref_dir = axis.any_orthonormal_vector();
                let angle = dir.dot(ref_dir).clamp(-1.0, 1.0).acos();
                (projected, DVec2::new(angle, along))
            }
            AnalyticEntity::Plane { origin, normal } => {
                let normal = normal.normalize();
                let projected = point - normal * (point - origin).dot(normal);
                let u_dir = normal.any_orthonormal_vector();
                let v_dir = normal.cross(u_dir);
                let offset = projected - origin;
                (projected, DVec2::new(offset.dot(u_dir), offset.dot(v_dir)))
            }
        }
    }

    /// Minimum and maximum principal radius of curvature. Constant over the
    /// whole entity for every analytic surface here, so `uv` is unused.
    fn radii_of_curvature(&self) -> (f64, f64) {
        match *self {
            AnalyticEntity::Sphere { radius, .. } => (radius, radius),
            AnalyticEntity::Cylinder { radius, .. } => (radius, FLAT_DIRECTION_RADIUS),
            AnalyticEntity::Plane { .. } => (FLAT_DIRECTION_RADIUS, FLAT_DIRECTION_RADIUS),
        }
    }
}

/// A geometry kernel over named analytic entities. Projection onto a group
/// picks the closest projection across the group's entities.
#[derive(Debug, Clone, Default)]
pub struct AnalyticKernel {
    entities: HashMap<String, AnalyticEntity>,
}

impl AnalyticKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, name: impl Into<String>, entity: AnalyticEntity) {
        self.entities.insert(name.into(), entity);
    }
}

impl GeometryKernel for AnalyticKernel {
    fn project_point(&self, group: &GeometryGroup, point: DVec3) -> Result<ProjectionData> {
        let mut best: Option<(f64, ProjectionData)> = None;
        for name in &group.entity_names {
            let Some(entity) = self.entities.get(name) else {
                continue;
            };
            let (xyz, uv) = entity.project(point);
            let dist = point.distance(xyz);
            if best.as_ref().map_or(true, |(best_dist, _)| dist < *best_dist) {
                best = Some((dist, ProjectionData::new(xyz, uv, name.clone())));
            }
        }
        let (_, projection) = best.ok_or_else(|| {
            anyhow!(
                "projection failed: no entity of geometry group {} is known to the kernel",
                group.gref
            )
        })?;
        Ok(projection)
    }

    fn eval_radius_of_curvature(&self, _uv: DVec2, entity_name: &str) -> Result<(f64, f64)> {
        let entity = self
            .entities
            .get(entity_name)
            .ok_or_else(|| anyhow!("unknown geometry entity {entity_name:?}"))?;
        Ok(entity.radii_of_curvature())
    }
}
