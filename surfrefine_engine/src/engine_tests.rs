// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;

use crate::mesh::trimesh::edit_ops::split_edge;
use crate::prelude::*;

/// Two coplanar triangles sharing the edge (0, 1).
fn two_triangle_mesh() -> TriMesh {
    let mut mesh = TriMesh::new();
    let p0 = mesh.add_point(DVec3::new(0.0, 0.0, 0.0));
    let p1 = mesh.add_point(DVec3::new(1.0, 0.0, 0.0));
    let p2 = mesh.add_point(DVec3::new(0.5, 1.0, 0.0));
    let p3 = mesh.add_point(DVec3::new(0.5, -1.0, 0.0));
    mesh.add_face(Face::tri(p0, p1, p2));
    mesh.add_face(Face::tri(p1, p0, p3));
    mesh.create_edges().unwrap();
    mesh
}

fn empty_ctx() -> (GeometryRegistry, MeshModel) {
    (GeometryRegistry::new(), MeshModel::new("model"))
}

/// The edge map must be a bijection between live node pairs and indices.
fn assert_edge_map_bijection(mesh: &TriMesh) {
    for (i, edge) in mesh.edges.iter().enumerate() {
        assert_eq!(
            mesh.lookup_edge(edge.nodes[0], edge.nodes[1]),
            Some(EdgeId::from_index(i))
        );
    }
}

#[test]
fn interior_edge_split() {
    let mut mesh = two_triangle_mesh();
    let (geometry, mut model) = empty_ctx();
    let points_before = mesh.points.clone();

    let edge = mesh.find_and_orient_edge(PointId(0), PointId(1)).unwrap();
    let modified = split_edge(&mut mesh, &geometry, &mut model, edge).unwrap();

    // One new point at the arithmetic midpoint, two new faces, three new
    // edges.
    assert_eq!(mesh.points.len(), 5);
    assert_eq!(mesh.faces.len(), 4);
    assert_eq!(mesh.edges.len(), 8);
    assert_eq!(mesh.position(PointId(4)), DVec3::new(0.5, 0.0, 0.0));

    // Pre-existing points are untouched.
    for (before, after) in points_before.iter().zip(&mesh.points) {
        assert_eq!(before.r.to_ord(), after.r.to_ord());
    }

    // Both parent face slots were reused for the children containing node 0;
    // the other children were appended.
    assert_eq!(mesh.faces[0].nodes(), &[PointId(0), PointId(4), PointId(2)]);
    assert_eq!(mesh.faces[1].nodes(), &[PointId(4), PointId(0), PointId(3)]);
    assert_eq!(mesh.faces[2].nodes(), &[PointId(4), PointId(1), PointId(2)]);
    assert_eq!(mesh.faces[3].nodes(), &[PointId(1), PointId(4), PointId(3)]);

    for (a, b) in [(0, 4), (4, 1), (4, 2), (3, 4)] {
        assert!(
            mesh.lookup_edge(PointId(a), PointId(b)).is_some(),
            "expected edge ({a}, {b}) after the split"
        );
    }
    // The parent pair is gone; its slot holds the first child.
    assert!(mesh.lookup_edge(PointId(0), PointId(1)).is_none());
    assert_eq!(mesh.lookup_edge(PointId(0), PointId(4)), Some(edge));

    assert_eq!(modified.len(), 4);
    assert!(modified.contains(&edge));

    mesh.check_faces().unwrap();
    mesh.check_edges().unwrap();
    assert_edge_map_bijection(&mesh);
}

#[test]
fn lamina_edge_split() {
    let mut mesh = TriMesh::new();
    let p0 = mesh.add_point(DVec3::new(0.0, 0.0, 0.0));
    let p1 = mesh.add_point(DVec3::new(1.0, 0.0, 0.0));
    let p2 = mesh.add_point(DVec3::new(0.5, 1.0, 0.0));
    mesh.add_face(Face::tri(p0, p1, p2));
    mesh.create_edges().unwrap();
    let (geometry, mut model) = empty_ctx();

    let edge = mesh.find_and_orient_edge(p0, p1).unwrap();
    let modified = split_edge(&mut mesh, &geometry, &mut model, edge).unwrap();

    // A lamina split adds one face and two edges.
    assert_eq!(mesh.points.len(), 4);
    assert_eq!(mesh.faces.len(), 2);
    assert_eq!(mesh.edges.len(), 5);
    assert_eq!(modified.len(), 3);

    assert_eq!(mesh.faces[0].nodes(), &[PointId(0), PointId(3), PointId(2)]);
    assert_eq!(mesh.faces[1].nodes(), &[PointId(3), PointId(1), PointId(2)]);

    // Child edges stay lamina; the face-splitting edge is interior.
    let child1 = mesh.lookup_edge(PointId(0), PointId(3)).unwrap();
    let child2 = mesh.lookup_edge(PointId(3), PointId(1)).unwrap();
    assert!(mesh[child1].is_lamina());
    assert!(mesh[child2].is_lamina());
    let fsplit = mesh.lookup_edge(PointId(3), PointId(2)).unwrap();
    assert!(!mesh[fsplit].is_lamina());

    mesh.check_faces().unwrap();
    mesh.check_edges().unwrap();
    assert_edge_map_bijection(&mesh);
}

/// A kernel whose projections land a fixed offset away from the query.
struct OffsetKernel {
    offset: DVec3,
}

impl GeometryKernel for OffsetKernel {
    fn project_point(&self, _group: &GeometryGroup, point: DVec3) -> Result<ProjectionData> {
        Ok(ProjectionData::new(
            point + self.offset,
            DVec2::ZERO,
            "offset".into(),
        ))
    }

    fn eval_radius_of_curvature(&self, _uv: DVec2, _entity_name: &str) -> Result<(f64, f64)> {
        bail!("no curvature")
    }
}

#[test]
fn split_projects_midpoint_onto_constrained_geometry() {
    let mut mesh = two_triangle_mesh();

    let mut geometry = GeometryRegistry::new();
    geometry.add_group(GeometryGroup {
        gref: 7,
        entity_names: vec!["offset".into()],
    });
    geometry.set_active_kernel(Box::new(OffsetKernel {
        offset: DVec3::new(0.1, 0.0, 0.0),
    }));

    let mut model = MeshModel::new("model");
    model.add_edge(
        1,
        2,
        EdgeRecord::new(TopoRef {
            id: 1,
            aref: 0,
            gref: 7,
            name: "seam".into(),
        }),
    );

    let edge = mesh.find_and_orient_edge(PointId(0), PointId(1)).unwrap();
    split_edge(&mut mesh, &geometry, &mut model, edge).unwrap();

    // The inserted point is the projection, not the arithmetic midpoint.
    let inserted = mesh.position(PointId(4));
    assert_relative_eq!(inserted.x, 0.6, epsilon = 1e-15);
    assert_eq!(inserted.y, 0.0);
    assert_eq!(inserted.z, 0.0);
}

/// A kernel that refuses every projection.
struct FailingKernel;

impl GeometryKernel for FailingKernel {
    fn project_point(&self, _group: &GeometryGroup, _point: DVec3) -> Result<ProjectionData> {
        bail!("projector offline")
    }

    fn eval_radius_of_curvature(&self, _uv: DVec2, _entity_name: &str) -> Result<(f64, f64)> {
        bail!("no curvature")
    }
}

#[test]
fn failed_midpoint_projection_aborts_split_without_mutation() {
    let mut mesh = two_triangle_mesh();

    let mut geometry = GeometryRegistry::new();
    geometry.add_group(GeometryGroup {
        gref: 7,
        entity_names: vec!["offset".into()],
    });
    geometry.set_active_kernel(Box::new(FailingKernel));

    let mut model = MeshModel::new("model");
    model.add_edge(1, 2, EdgeRecord::new(TopoRef { gref: 7, ..Default::default() }));

    let edge = mesh.find_and_orient_edge(PointId(0), PointId(1)).unwrap();
    let result = split_edge(&mut mesh, &geometry, &mut model, edge);
    assert!(result.is_err());

    // Nothing was committed.
    assert_eq!(mesh.points.len(), 4);
    assert_eq!(mesh.faces.len(), 2);
    assert_eq!(mesh.edges.len(), 5);
    assert!(mesh.lookup_edge(PointId(0), PointId(1)).is_some());
    assert_eq!(model.num_string_edges(), 1);
    mesh.check_faces().unwrap();
    mesh.check_edges().unwrap();
}

#[test]
fn long_edges_of_high_aspect_triangle_are_forced_to_split() {
    // Isoceles triangle with edge lengths 10, 10, 1.
    let mut mesh = TriMesh::new();
    let height = (100.0f64 - 0.25).sqrt();
    let p0 = mesh.add_point(DVec3::new(0.0, 0.0, 0.0));
    let p1 = mesh.add_point(DVec3::new(1.0, 0.0, 0.0));
    let p2 = mesh.add_point(DVec3::new(0.5, height, 0.0));
    mesh.add_face(Face::tri(p0, p1, p2));
    mesh.create_edges().unwrap();
    mesh.set_constraints(MeshConstraints::new(1.0, 5.0, 20.0));
    let (geometry, model) = empty_ctx();

    let long_edge = mesh.lookup_edge(p0, p2).unwrap();
    let mut entry = EdgeQual::new(long_edge);
    entry.compute_quality(&mesh, &geometry, &model);
    assert_eq!(entry.quality, FORCE_SPLIT_QUALITY);

    // The short edge is below the minimum split length and must score zero.
    let short_edge = mesh.lookup_edge(p0, p1).unwrap();
    let mut entry = EdgeQual::new(short_edge);
    entry.compute_quality(&mesh, &geometry, &model);
    assert_eq!(entry.quality, PREVENT_SPLIT_QUALITY);
}

#[test]
fn queue_spreads_quality_to_fan_neighbors() {
    // A fan of 5 triangles around a central vertex.
    let mut mesh = TriMesh::new();
    let center = mesh.add_point(DVec3::ZERO);
    let rim: Vec<PointId> = (0..6)
        .map(|i| {
            let angle = i as f64 * std::f64::consts::PI / 6.0;
            mesh.add_point(DVec3::new(angle.cos(), angle.sin(), 0.0))
        })
        .collect();
    for pair in rim.windows(2) {
        mesh.add_face(Face::tri(center, pair[0], pair[1]));
    }
    mesh.create_edges().unwrap();
    let (geometry, model) = empty_ctx();

    // Seed with the central fan edge at a dominating quality.
    let central = mesh.lookup_edge(center, rim[2]).unwrap();
    let mut seed = EdgeQual::new(central);
    seed.compute_quality(&mesh, &geometry, &model);
    seed.quality = 100.0;
    let mut queue: EdgeRefineQueue = vec![seed];

    add_neighbors_to_queue(&mesh, &geometry, &model, 0.0, &mut queue);

    let legs = [
        mesh.lookup_edge(center, rim[1]).unwrap(),
        mesh.lookup_edge(rim[2], rim[1]).unwrap(),
        mesh.lookup_edge(center, rim[3]).unwrap(),
        mesh.lookup_edge(rim[2], rim[3]).unwrap(),
    ];
    for leg in legs {
        let entry = queue
            .iter()
            .find(|entry| entry.edge == leg)
            .unwrap_or_else(|| panic!("leg {leg:?} was not enqueued"));
        assert!(entry.quality >= 50.0);
    }
    // No edge is queued twice.
    assert_eq!(queue.iter().map(|e| e.edge).duplicates().count(), 0);
}

fn tagged(id: i64, gref: i64, name: &str) -> TopoRef {
    TopoRef {
        id,
        aref: id * 10,
        gref,
        name: name.into(),
    }
}

#[test]
fn split_mirrors_strings_and_sheets() {
    let mut mesh = two_triangle_mesh();

    // The mesh lies in the z = 0 plane, so projecting onto it is exact.
    let mut geometry = GeometryRegistry::new();
    geometry.add_group(GeometryGroup {
        gref: 30,
        entity_names: vec!["plane".into()],
    });
    geometry.add_group(GeometryGroup {
        gref: 31,
        entity_names: vec!["plane".into()],
    });
    let mut kernel = AnalyticKernel::new();
    kernel.add_entity(
        "plane",
        AnalyticEntity::Plane {
            origin: DVec3::ZERO,
            normal: DVec3::Z,
        },
    );
    geometry.set_active_kernel(Box::new(kernel));

    // The parent edge belongs to a string and a sheet; both faces have
    // sheet records.
    let mut model = MeshModel::new("model");
    model.add_edge(1, 2, EdgeRecord::new(tagged(10, 30, "seam")));
    model.add_face_edge(1, 2, EdgeRecord::new(tagged(11, 31, "")));
    model.add_face(1, 2, 3, FaceRecord::new(tagged(12, 31, "face-a")));
    model.add_face(1, 2, 4, FaceRecord::new(tagged(13, 31, "face-b")));

    let mut string = MeshString::new("string");
    string.add_edge(1, 2, EdgeRecord::new(tagged(10, 30, "seam")));
    model.strings.push(string);

    let mut sheet = MeshSheet::new("sheet");
    sheet.add_face_edge(1, 2, EdgeRecord::new(tagged(11, 31, "")));
    sheet.add_face(1, 2, 3, FaceRecord::new(tagged(12, 31, "face-a")));
    sheet.add_face(1, 2, 4, FaceRecord::new(tagged(13, 31, "face-b")));
    model.sheets.push(sheet);

    let edge = mesh.find_and_orient_edge(PointId(0), PointId(1)).unwrap();
    split_edge(&mut mesh, &geometry, &mut model, edge).unwrap();

    // Model: exactly the two child string edges, named after the parent.
    assert_eq!(model.num_string_edges(), 2);
    assert_eq!(
        model.find_string_edge_by_inds(1, 5).unwrap().topo.name,
        "seam.1"
    );
    assert_eq!(
        model.find_string_edge_by_inds(2, 5).unwrap().topo.name,
        "seam.2"
    );

    // Model: two child face-edges plus one face-splitting edge per face.
    assert_eq!(model.num_face_edges(), 4);
    assert!(model.find_face_edge_by_inds(1, 5).is_some());
    assert!(model.find_face_edge_by_inds(2, 5).is_some());
    let fsplit1 = model.find_face_edge_by_inds(5, 3).unwrap();
    assert_eq!(fsplit1.topo.id, 12);
    let fsplit2 = model.find_face_edge_by_inds(4, 5).unwrap();
    assert_eq!(fsplit2.topo.id, 13);

    // Model: four child faces inheriting tags and derived names.
    assert_eq!(model.num_faces(), 4);
    assert_eq!(model.find_face_by_inds(1, 5, 3).unwrap().topo.name, "face-a.1");
    assert_eq!(model.find_face_by_inds(5, 2, 3).unwrap().topo.name, "face-a.2");
    assert_eq!(model.find_face_by_inds(5, 1, 4).unwrap().topo.name, "face-b.1");
    assert_eq!(model.find_face_by_inds(2, 5, 4).unwrap().topo.name, "face-b.2");
    let child = model.find_face_by_inds(1, 5, 3).unwrap();
    assert_eq!((child.topo.id, child.topo.aref, child.topo.gref), (12, 120, 31));

    // The same additions were repeated in the containing string and sheet,
    // and every parent record is gone.
    let string = &model.strings[0];
    assert_eq!(string.num_edges(), 2);
    assert!(string.find_edge_by_inds(1, 2).is_none());
    assert_eq!(string.find_edge_by_inds(1, 5).unwrap().topo.name, "seam.1");

    let sheet = &model.sheets[0];
    assert_eq!(sheet.num_face_edges(), 4);
    assert_eq!(sheet.num_faces(), 4);
    assert!(sheet.find_face_edge_by_inds(1, 2).is_none());
    assert!(sheet.find_face_by_inds(1, 2, 3).is_none());
    assert!(sheet.find_face_by_inds(1, 2, 4).is_none());
    assert_eq!(sheet.find_face_by_inds(5, 2, 3).unwrap().topo.name, "face-a.2");

    assert!(model.find_string_edge_by_inds(1, 2).is_none());
    assert!(model.find_face_edge_by_inds(1, 2).is_none());
    assert!(model.find_face_by_inds(1, 2, 3).is_none());
    assert!(model.find_face_by_inds(1, 2, 4).is_none());
}

#[test]
fn edge_quality_matches_sphere_subtension() {
    // Two sphere points an arc apart: quality must equal the arc sector
    // angle subtended by the chord at the sphere radius.
    let radius = 2.0;
    let theta = 0.4f64;
    let mut mesh = TriMesh::new();
    let p0 = mesh.add_point(DVec3::new(radius, 0.0, 0.0));
    let p1 = mesh.add_point(DVec3::new(
        radius * theta.cos(),
        radius * theta.sin(),
        0.0,
    ));
    let p2 = mesh.add_point(DVec3::new(0.0, 0.0, radius));
    mesh.add_face(Face::tri(p0, p1, p2));
    mesh.create_edges().unwrap();

    let mut geometry = GeometryRegistry::new();
    geometry.add_group(GeometryGroup {
        gref: 1,
        entity_names: vec!["ball".into()],
    });
    let mut kernel = AnalyticKernel::new();
    kernel.add_entity(
        "ball",
        AnalyticEntity::Sphere {
            center: DVec3::ZERO,
            radius,
        },
    );
    geometry.set_active_kernel(Box::new(kernel));

    let mut model = MeshModel::new("model");
    let mut sheet = MeshSheet::new("sheet");
    sheet.add_face_edge(1, 2, EdgeRecord::new(tagged(1, 1, "")));
    model.sheets.push(sheet);

    let edge_id = mesh.lookup_edge(p0, p1).unwrap();
    let mut entry = EdgeQual::new(edge_id);
    entry.compute_quality(&mesh, &geometry, &model);

    let chord = mesh.edge_length(&mesh[edge_id]);
    let expected = 360.0 * chord / (std::f64::consts::TAU * radius);
    assert_relative_eq!(entry.quality, expected, epsilon = 1e-12);
    assert!(entry.quality < FORCE_SPLIT_QUALITY);
}

#[test]
fn interpolated_sampling_matches_projection_on_a_single_entity() {
    let radius = 3.0;
    let mut mesh = TriMesh::new();
    let p0 = mesh.add_point(DVec3::new(radius, 0.0, 0.0));
    let p1 = mesh.add_point(DVec3::new(0.0, radius, 0.0));
    let p2 = mesh.add_point(DVec3::new(0.0, 0.0, radius));
    mesh.add_face(Face::tri(p0, p1, p2));
    mesh.create_edges().unwrap();

    let mut geometry = GeometryRegistry::new();
    geometry.add_group(GeometryGroup {
        gref: 1,
        entity_names: vec!["ball".into()],
    });
    let mut kernel = AnalyticKernel::new();
    kernel.add_entity(
        "ball",
        AnalyticEntity::Sphere {
            center: DVec3::ZERO,
            radius,
        },
    );
    geometry.set_active_kernel(Box::new(kernel));

    let mut record = EdgeRecord::new(tagged(1, 1, ""));
    record.param_verts = [
        Some(ParamVert {
            gref: 1,
            uv: DVec2::new(0.0, 0.0),
        }),
        Some(ParamVert {
            gref: 1,
            uv: DVec2::new(0.5, 0.5),
        }),
    ];

    let projected = edge_radius_of_curvature(
        &geometry,
        &record,
        mesh.position(p0),
        mesh.position(p1),
    )
    .unwrap();

    geometry.curvature_sampling = CurvatureSampling::InterpolateParamVerts;
    let interpolated = edge_radius_of_curvature(
        &geometry,
        &record,
        mesh.position(p0),
        mesh.position(p1),
    )
    .unwrap();

    // The sphere's curvature is constant, so both sampling modes agree.
    assert_relative_eq!(projected, radius);
    assert_relative_eq!(interpolated, radius);
}

#[test]
fn refinement_pulls_octahedron_toward_sphere() {
    // Octahedron inscribed in the unit sphere; refinement must insert points
    // on the sphere and keep the topology sound.
    let mut mesh = TriMesh::new();
    let px = mesh.add_point(DVec3::X);
    let pnx = mesh.add_point(-DVec3::X);
    let py = mesh.add_point(DVec3::Y);
    let pny = mesh.add_point(-DVec3::Y);
    let pz = mesh.add_point(DVec3::Z);
    let pnz = mesh.add_point(-DVec3::Z);
    for (a, b) in [(px, py), (py, pnx), (pnx, pny), (pny, px)] {
        mesh.add_face(Face::tri(a, b, pz));
        mesh.add_face(Face::tri(b, a, pnz));
    }
    mesh.create_edges().unwrap();
    mesh.set_constraints(MeshConstraints::new(1e-3, 1e3, 0.0));

    let mut geometry = GeometryRegistry::new();
    geometry.add_group(GeometryGroup {
        gref: 1,
        entity_names: vec!["ball".into()],
    });
    let mut kernel = AnalyticKernel::new();
    kernel.add_entity(
        "ball",
        AnalyticEntity::Sphere {
            center: DVec3::ZERO,
            radius: 1.0,
        },
    );
    geometry.set_active_kernel(Box::new(kernel));

    let mut model = MeshModel::new("model");
    model.bind_mesh_sheet(&mesh, "sheet", 1);

    let options = RefineOptions {
        quality_threshold: 30.0,
        max_passes: 2,
    };
    let stats = refine(&mut mesh, &geometry, &mut model, &options).unwrap();
    assert!(stats.total_splits > 0);

    mesh.check_faces().unwrap();
    mesh.check_edges().unwrap();
    assert_edge_map_bijection(&mesh);

    // Every inserted point was projected onto the sphere.
    for point in &mesh.points[6..] {
        assert_relative_eq!(point.r.length(), 1.0, epsilon = 1e-12);
    }
    // No point was inserted twice.
    let unique: HashSet<_> = mesh.points.iter().map(|p| p.r.to_ord()).collect();
    assert_eq!(unique.len(), mesh.points.len());

    // The refined mesh resolves curvature better than the octahedron did.
    let stats_after = geometry_resolution_stats(&mesh, &geometry, &model);
    assert!(stats_after.num_constrained_edges > 0);
    assert!(stats_after.max_subtension_deg < 90.0);
}

#[test]
fn split_rejects_quad_faces() {
    let mut mesh = TriMesh::new();
    let p: Vec<_> = [
        DVec3::new(0.0, 0.0, 0.0),
        DVec3::new(1.0, 0.0, 0.0),
        DVec3::new(1.0, 1.0, 0.0),
        DVec3::new(0.0, 1.0, 0.0),
    ]
    .iter()
    .map(|&r| mesh.add_point(r))
    .collect();
    mesh.add_face(Face::from_nodes(&[p[0], p[1], p[2], p[3]]).unwrap());
    // Hand-build the edge so the split sees a quad face.
    let mut edge = Edge::new(p[0], p[1]);
    edge.faces[0] = Some(FaceId(0));
    mesh.add_edge(edge);
    let (geometry, mut model) = empty_ctx();

    let edge = mesh.lookup_edge(p[0], p[1]).unwrap();
    assert!(split_edge(&mut mesh, &geometry, &mut model, edge).is_err());
}
