// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Booster Physics
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Booster physics: intertwiner and virtual-spin bounds, and the block
//! kernel producing b4 coefficients for one virtual-spin quadruple.

pub mod block;
pub mod bounds;

pub use block::{BlockKernel, BlockMatrix, ExternalKernel, HeuristicKernel};
pub use bounds::{BoosterBounds, IntertwinerRange, ShellRanges};
