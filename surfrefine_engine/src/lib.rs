// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Some useful re-exports
pub mod prelude;

/// The surface mesh data structure and the edge-split operator
pub mod mesh;

/// The geometry kernel boundary: projection and curvature evaluation
pub mod geometry;

/// The mesh-geometry associativity registry
pub mod assoc;

/// Edge quality scoring, the refinement queue and the refinement loop
pub mod refine;

#[cfg(test)]
mod engine_tests;
