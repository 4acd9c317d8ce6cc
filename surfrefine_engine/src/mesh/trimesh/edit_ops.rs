// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

/// Splits an edge by inserting a point at its midpoint, projected back onto
/// the geometry the edge is constrained to. Each adjacent face is split into
/// two child faces, and the parent edge into two child edges, with one new
/// face-splitting edge per adjacent face:
///
/// ```text
///          ^                       ^
///        /   \                   / | \
///      /       \               /   |   \
///    /           \           /     |     \
///  <--------------->  ==>  <-------O------->
///    \            /         \      |      /
///      \        /             \    |    /
///        \    /                 \  |  /
///          \/                     \ /
/// ```
///
/// Every structural change is mirrored into the associativity model so the
/// refined mesh keeps its binding to the CAD geometry.
///
/// ## Id stability
/// Storage of the parent edge and of each adjacent face is reused: the
/// parent edge's slot becomes the child edge from `n0` to the midpoint, and
/// each parent face's slot becomes the child face containing `n0`. The other
/// children are appended. Returned are the indices of all created or
/// re-nodded edges (the reused slot, the second child and the face-splitting
/// edges); leg edges keep their nodes and are not reported even though their
/// face slots are updated in place.
///
/// ## Atomicity
/// The only recoverable failure is midpoint projection, and it is checked
/// before the first mutation: on `Err` the mesh and the associativity are
/// untouched. Anything that goes wrong after that point is topology
/// corruption and panics.
pub fn split_edge(
    mesh: &mut TriMesh,
    geometry: &GeometryRegistry,
    model: &mut MeshModel,
    edge_id: EdgeId,
) -> Result<SVec<EdgeId>> {
    // A lamina edge may have been left with its face in the outside slot by
    // an orientation-matching lookup; normalize before snapshotting.
    if mesh[edge_id].faces[0].is_none() {
        mesh[edge_id].flip();
    }
    let parent_edge = mesh[edge_id];
    let [n0, n1] = parent_edge.nodes;
    let f1_id = parent_edge.faces[0]
        .unwrap_or_else(|| panic!("split_edge: edge {edge_id:?} has no adjacent face"));

    // Parent associativity indices (1-based): endpoints, then the apex of
    // each adjacent face. -1 stands for "no such face".
    let mut parent_inds = [-1i64; 4];
    parent_inds[0] = n0.one_based();
    parent_inds[1] = n1.one_based();

    // Face on the "inside" of the edge, clocked so nodes 0-1 are the split
    // edge.
    let mut parent_face1 = mesh[f1_id].clone();
    if parent_face1.num_nodes() != 3 {
        bail!("split_edge: face {f1_id:?} is not a triangle");
    }
    parent_face1.clock(n0, n1);
    let capex = parent_face1.nodes()[2];
    parent_inds[2] = capex.one_based();

    // Face on the "outside" of the edge, if any (lamina boundaries have
    // none). Clocked to the opposite sense, since neighboring triangles
    // traverse their shared edge in opposite directions.
    let mut dapex = None;
    if let Some(f2_id) = parent_edge.faces[1] {
        let mut parent_face2 = mesh[f2_id].clone();
        if parent_face2.num_nodes() != 3 {
            bail!("split_edge: face {f2_id:?} is not a triangle");
        }
        parent_face2.clock(n1, n0);
        let apex = parent_face2.nodes()[2];
        dapex = Some(apex);
        parent_inds[3] = apex.one_based();
    }

    // The point being inserted. When the parent edge is constrained to
    // geometry, the midpoint is pulled back onto it; a projection failure
    // aborts the split before any mutation.
    let mut new_pt = 0.5 * (mesh.position(n0) + mesh.position(n1));
    if let Some(assoc_edge) = model.find_lowest_topo_edge_by_inds(parent_inds[0], parent_inds[1]) {
        let (projected, _dist) = project_to_topo_geometry(geometry, assoc_edge.topo.gref, new_pt)
            .context("bad edge point projection")?;
        new_pt = projected;
    }

    let m = mesh.add_point(new_pt);
    let m1 = m.one_based();

    let mut child_edge1 = Edge::new(n0, m);
    let mut child_edge2 = Edge::new(m, n1);

    //=== split face 1
    let face1_split_edge = {
        // The leg running from the split edge to the face 1 apex, oriented
        // to match the face orientation.
        let rleg_id = mesh
            .find_and_orient_edge(n1, capex)
            .unwrap_or_else(|| panic!("split_edge: leg ({n1:?}, {capex:?}) not found"));
        assert!(
            mesh[rleg_id].faces[0] == Some(f1_id),
            "split_edge: leg {rleg_id:?} is not oriented into face {f1_id:?}"
        );

        let mut face_split = Edge::new(m, capex);

        // Reuse face 1 storage for the child containing n0; append the
        // other child.
        mesh[f1_id] = Face::tri(n0, m, capex);
        child_edge1.faces[0] = Some(f1_id);
        face_split.faces[0] = Some(f1_id);

        let f1b_id = mesh.add_face(Face::tri(m, n1, capex));
        child_edge2.faces[0] = Some(f1b_id);
        face_split.faces[1] = Some(f1b_id);

        // The leg now borders the appended child, not the reused slot.
        mesh[rleg_id].faces[0] = Some(f1b_id);

        face_split
    };

    //=== split face 2 (mirrored orientation)
    let mut face2_split_edge = None;
    if let (Some(f2_id), Some(dapex)) = (parent_edge.faces[1], dapex) {
        let lleg_id = mesh
            .find_and_orient_edge(dapex, n1)
            .unwrap_or_else(|| panic!("split_edge: leg ({dapex:?}, {n1:?}) not found"));
        assert!(
            mesh[lleg_id].faces[0] == Some(f2_id),
            "split_edge: leg {lleg_id:?} is not oriented into face {f2_id:?}"
        );

        let mut face_split = Edge::new(dapex, m);

        mesh[f2_id] = Face::tri(m, n0, dapex);
        child_edge1.faces[1] = Some(f2_id);
        face_split.faces[0] = Some(f2_id);

        let f2b_id = mesh.add_face(Face::tri(n1, m, dapex));
        child_edge2.faces[1] = Some(f2b_id);
        face_split.faces[1] = Some(f2b_id);

        mesh[lleg_id].faces[0] = Some(f2b_id);

        face2_split_edge = Some(face_split);
    }

    // Face topology is settled; the parent edge slot can now become child
    // edge 1, and the new edges are appended.
    let mut modified_edges = SVec::new();
    mesh.update_edge(edge_id, child_edge1)
        .expect("split_edge: parent edge is not in the edge map");
    modified_edges.push(edge_id);
    modified_edges.push(mesh.add_edge(child_edge2));
    let face1_split_nodes = face1_split_edge.nodes;
    modified_edges.push(mesh.add_edge(face1_split_edge));
    let face2_split_nodes = face2_split_edge.as_ref().map(|e| e.nodes);
    if let Some(face_split) = face2_split_edge {
        modified_edges.push(mesh.add_edge(face_split));
    }

    mirror_into_associativity(
        model,
        parent_inds,
        m1,
        face1_split_nodes,
        face2_split_nodes,
    );

    debug_assert!(mesh.lookup_edge(n0, n1).is_none());
    debug_assert!(mesh[f1_id].nodes()[..2] == [n0, m]);
    debug_assert!(mesh.lookup_edge(n0, m) == Some(edge_id));
    debug_assert!(mesh.face_has_edge(f1_id, &mesh[edge_id]));

    Ok(modified_edges)
}

/// Mirror a committed split into the associativity model: child records are
/// added with the parent's (ID, Aref, Gref) tags, repeated in every string
/// and sheet that held the parent, and the parent records are deleted last.
fn mirror_into_associativity(
    model: &mut MeshModel,
    parent_inds: [i64; 4],
    m1: i64,
    face1_split_nodes: [PointId; 2],
    face2_split_nodes: Option<[PointId; 2]>,
) {
    let [pn0, pn1, papex1, papex2] = parent_inds;

    let assoc_string_edge = model.find_string_edge_by_inds(pn0, pn1).cloned();
    let assoc_sheet_edge = model.find_face_edge_by_inds(pn0, pn1).cloned();

    if let Some(record) = &assoc_string_edge {
        // The parent edge lies on a curve: add the child edges to the model
        // and to every string containing the parent, with derived names.
        for (ind, suffix) in [(pn0, ".1"), (pn1, ".2")] {
            model.add_edge(ind, m1, child_edge_record(record, suffix));
        }
        for string in &mut model.strings {
            let Some(record) = string.find_edge_by_inds(pn0, pn1).cloned() else {
                continue;
            };
            for (ind, suffix) in [(pn0, ".1"), (pn1, ".2")] {
                string.add_edge(ind, m1, child_edge_record(&record, suffix));
            }
        }
    }

    if let Some(record) = &assoc_sheet_edge {
        // The parent edge lies on a sheet: add the child face-edges to the
        // model and to every sheet containing the parent.
        for ind in [pn0, pn1] {
            model.add_face_edge(ind, m1, child_edge_record(record, ""));
        }
        for sheet in &mut model.sheets {
            let Some(record) = sheet.find_face_edge_by_inds(pn0, pn1).cloned() else {
                continue;
            };
            for ind in [pn0, pn1] {
                sheet.add_face_edge(ind, m1, child_edge_record(&record, ""));
            }
        }

        let split1 = [
            face1_split_nodes[0].one_based(),
            face1_split_nodes[1].one_based(),
        ];
        mirror_face_split(model, [pn0, pn1, papex1], m1, split1, FaceSide::Inside);

        if let Some(nodes) = face2_split_nodes {
            let split2 = [nodes[0].one_based(), nodes[1].one_based()];
            mirror_face_split(model, [pn0, pn1, papex2], m1, split2, FaceSide::Outside);
        }
    }

    // Delete the parent records last: edge and face-edge in the model, the
    // two parent faces, then the per-string and per-sheet repeats.
    model.delete_edge_by_inds(pn0, pn1);
    model.delete_face_by_inds(pn0, pn1, papex1);
    model.delete_face_by_inds(pn0, pn1, papex2);
    for string in &mut model.strings {
        string.delete_edge_by_inds(pn0, pn1);
    }
    for sheet in &mut model.sheets {
        sheet.delete_face_edge_by_inds(pn0, pn1);
        sheet.delete_face_by_inds(pn0, pn1, papex1);
        sheet.delete_face_by_inds(pn0, pn1, papex2);
    }
}

#[derive(Clone, Copy)]
enum FaceSide {
    Inside,
    Outside,
}

impl FaceSide {
    /// Node triples of the two child faces, in associativity indices. The
    /// outside face mirrors the inside face's orientation.
    fn child_faces(self, [pn0, pn1, papex]: [i64; 3], m1: i64) -> [[i64; 3]; 2] {
        match self {
            FaceSide::Inside => [[pn0, m1, papex], [m1, pn1, papex]],
            FaceSide::Outside => [[m1, pn0, papex], [pn1, m1, papex]],
        }
    }
}

/// Mirror one adjacent face's split: the face-splitting edge plus the two
/// child faces, in the model and in every sheet containing the parent face.
fn mirror_face_split(
    model: &mut MeshModel,
    parent_face: [i64; 3],
    m1: i64,
    split_edge: [i64; 2],
    side: FaceSide,
) {
    let [pn0, pn1, papex] = parent_face;
    let Some(record) = model.find_face_by_inds(pn0, pn1, papex).cloned() else {
        return;
    };

    model.add_face_edge(
        split_edge[0],
        split_edge[1],
        EdgeRecord::new(TopoRef {
            name: String::new(),
            ..record.topo.clone()
        }),
    );
    for (child, suffix) in side.child_faces(parent_face, m1).into_iter().zip([".1", ".2"]) {
        model.add_face(
            child[0],
            child[1],
            child[2],
            child_face_record(&record, &record, suffix),
        );
    }

    for sheet in &mut model.sheets {
        let Some(sheet_record) = sheet.find_face_by_inds(pn0, pn1, papex).cloned() else {
            continue;
        };
        sheet.add_face_edge(
            split_edge[0],
            split_edge[1],
            EdgeRecord::new(TopoRef {
                name: String::new(),
                ..sheet_record.topo.clone()
            }),
        );
        // Child names derive from the model-level parent record; the tags
        // come from the sheet's own record.
        for (child, suffix) in side.child_faces(parent_face, m1).into_iter().zip([".1", ".2"]) {
            sheet.add_face(
                child[0],
                child[1],
                child[2],
                child_face_record(&sheet_record, &record, suffix),
            );
        }
    }
}

fn child_edge_record(parent: &EdgeRecord, suffix: &str) -> EdgeRecord {
    let name = if suffix.is_empty() {
        String::new()
    } else {
        format!("{}{}", parent.topo.name, suffix)
    };
    EdgeRecord::new(TopoRef {
        name,
        ..parent.topo.clone()
    })
}

fn child_face_record(tags: &FaceRecord, named: &FaceRecord, suffix: &str) -> FaceRecord {
    FaceRecord::new(TopoRef {
        name: format!("{}{}", named.topo.name, suffix),
        ..tags.topo.clone()
    })
}
