// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use glam::DVec3;
use surfrefine_engine::assoc::{GeometryGroup, MeshAssociativity, MeshModel};
use surfrefine_engine::geometry::{AnalyticEntity, AnalyticKernel};
use surfrefine_engine::mesh::trimesh::{vrml, MeshConstraints};
use surfrefine_engine::refine::{geometry_resolution_stats, refine, RefineOptions};

/// Refine an unstructured triangular surface mesh. Edges are scored by mesh
/// shape constraints and by the arc angle they subtend on the constrained
/// geometry; bad edges are split at their midpoint, and inserted points are
/// projected back onto the geometry.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Input mesh (VRML 1.0 subset)
    input: PathBuf,

    /// Output mesh (VRML 1.0 subset)
    output: PathBuf,

    /// Minimum allowed edge length
    #[arg(long, default_value_t = 0.01)]
    min_edge_length: f64,

    /// Maximum allowed triangle aspect ratio
    #[arg(long, default_value_t = 10.0)]
    max_aspect_ratio: f64,

    /// Minimum allowed triangle included angle (degrees)
    #[arg(long, default_value_t = 15.0)]
    min_included_angle: f64,

    /// Split edges whose quality (degrees of subtended arc) exceeds this
    #[arg(long, default_value_t = 10.0)]
    quality_threshold: f64,

    /// Upper bound on refinement passes
    #[arg(long, default_value_t = 4)]
    max_passes: usize,

    /// Constrain the mesh to an analytic sphere: "cx,cy,cz,radius"
    #[arg(long, value_name = "CX,CY,CZ,R")]
    sphere: Option<String>,
}

fn parse_sphere(spec: &str) -> Result<AnalyticEntity> {
    let values: Vec<f64> = spec
        .split(',')
        .map(|tok| tok.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("bad sphere spec {spec:?}"))?;
    let &[cx, cy, cz, radius] = values.as_slice() else {
        bail!("sphere spec {spec:?} must be cx,cy,cz,radius");
    };
    if radius <= 0.0 {
        bail!("sphere radius must be positive");
    }
    Ok(AnalyticEntity::Sphere {
        center: DVec3::new(cx, cy, cz),
        radius,
    })
}

fn run(args: &Args) -> Result<()> {
    let mut mesh = vrml::read_vrml(&args.input)?;
    mesh.create_edges()?;
    mesh.set_constraints(MeshConstraints::new(
        args.min_edge_length,
        args.max_aspect_ratio,
        args.min_included_angle,
    ));
    log::info!(
        "read {}: {} points, {} faces, {} edges",
        args.input.display(),
        mesh.points.len(),
        mesh.faces.len(),
        mesh.edges.len()
    );

    // The associativity normally comes from a CAD associativity file; here
    // the whole mesh is bound to a single analytic geometry group when one
    // is given.
    let mut assoc = MeshAssociativity::new();
    let model_ind = assoc.add_model(MeshModel::new("model"));
    if let Some(spec) = &args.sphere {
        let sphere = parse_sphere(spec)?;
        let mut kernel = AnalyticKernel::new();
        kernel.add_entity("sphere", sphere);
        assoc.geometry.set_active_kernel(Box::new(kernel));
        assoc.geometry.add_group(GeometryGroup {
            gref: 1,
            entity_names: vec!["sphere".into()],
        });
        assoc.models[model_ind].bind_mesh_sheet(&mesh, "sheet", 1);
    }

    let MeshAssociativity { geometry, models } = &mut assoc;
    let model = &mut models[model_ind];

    geometry_resolution_stats(&mesh, geometry, model).log();

    let options = RefineOptions {
        quality_threshold: args.quality_threshold,
        max_passes: args.max_passes,
    };
    let stats = refine(&mut mesh, geometry, model, &options)?;
    log::info!(
        "refinement done: {} splits over {} passes",
        stats.total_splits,
        stats.passes.len()
    );

    geometry_resolution_stats(&mesh, geometry, model).log();

    mesh.check_faces()?;
    mesh.check_edges()?;

    vrml::write_vrml(&mesh, &args.output)?;
    log::info!(
        "wrote {}: {} points, {} faces",
        args.output.display(),
        mesh.points.len(),
        mesh.faces.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
