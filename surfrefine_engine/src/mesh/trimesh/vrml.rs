// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::prelude::*;

/// Read the point and face arrays from a VRML 1.0 subset file.
///
/// The format is line oriented: a `point [` line opens the coordinate block
/// and a `coordIndex [` line opens the face block; either block ends at a
/// line whose trimmed content is `]`. Point lines carry three reals, face
/// lines carry 3 or 4 zero-based node indices followed by a `-1` terminator.
pub fn read_vrml(path: impl AsRef<Path>) -> Result<TriMesh> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("opening VRML file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut mesh = TriMesh::new();
    let mut in_points = false;
    let mut in_faces = false;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        let trimmed = line.trim();

        if trimmed == "]" {
            in_points = false;
            in_faces = false;
            continue;
        }

        if in_points {
            let coords: Vec<f64> = trimmed
                .split_whitespace()
                .map(|tok| tok.trim_end_matches(',').parse::<f64>())
                .try_collect()
                .with_context(|| format!("{}:{}: bad point line", path.display(), lineno + 1))?;
            if coords.len() != 3 {
                bail!(
                    "{}:{}: expected 3 coordinates, got {}",
                    path.display(),
                    lineno + 1,
                    coords.len()
                );
            }
            mesh.add_point(DVec3::new(coords[0], coords[1], coords[2]));
            continue;
        }

        if in_faces {
            let inds: Vec<i64> = trimmed
                .split(',')
                .map(str::trim)
                .filter(|tok| !tok.is_empty())
                .map(str::parse::<i64>)
                .try_collect()
                .with_context(|| format!("{}:{}: bad face line", path.display(), lineno + 1))?;
            if inds.len() != 4 && inds.len() != 5 {
                bail!(
                    "{}:{}: expected 4 or 5 indices, got {}",
                    path.display(),
                    lineno + 1,
                    inds.len()
                );
            }
            // The last index is the face terminator and is discarded.
            let nodes: Vec<PointId> = inds[..inds.len() - 1]
                .iter()
                .map(|&ind| {
                    if ind < 0 {
                        bail!("{}:{}: negative node index {ind}", path.display(), lineno + 1);
                    }
                    Ok(PointId(ind as u32))
                })
                .try_collect()?;
            mesh.faces.push(Face::from_nodes(&nodes)?);
            continue;
        }

        if trimmed == "point [" {
            in_points = true;
        } else if trimmed == "coordIndex [" {
            in_faces = true;
        }
    }

    Ok(mesh)
}

/// Write the point and face arrays as a VRML 1.0 subset file. Points are
/// written with 17 significant digits so a read/write cycle reproduces the
/// coordinates bit-exactly.
pub fn write_vrml(mesh: &TriMesh, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("creating VRML file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "#VRML V1.0 ascii")?;
    writeln!(out, "#   exported from surfrefine")?;
    writeln!(out, "Separator {{ ")?;

    writeln!(out, " Coordinate3 {{")?;
    writeln!(out, "  point [")?;
    for point in &mesh.points {
        writeln!(
            out,
            "    {:.16e} {:.16e} {:.16e} ",
            point.r.x, point.r.y, point.r.z
        )?;
    }
    writeln!(out, "  ]")?;
    writeln!(out, " }}")?;

    writeln!(out, " IndexedFaceSet {{")?;
    writeln!(out, "  coordIndex [")?;
    for face in &mesh.faces {
        let inds = face.nodes().iter().map(|n| format!("{:7}", n.0)).join(",");
        writeln!(out, "        {inds},{:7},", -1)?;
    }
    writeln!(out, "  ]")?;
    writeln!(out, " }}")?;
    writeln!(out, "}}")?;

    out.flush()
        .with_context(|| format!("writing VRML file {}", path.display()))?;
    Ok(())
}
