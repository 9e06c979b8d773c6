// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Booster Engine Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Spin labels, request keys, configuration, and error hierarchy for
//! the booster tensor engine.

pub mod config;
pub mod error;
pub mod spin;

pub use config::{BoosterConfig, MAX_TWO_SPIN_CEILING};
pub use error::{BoosterError, BoosterResult};
pub use spin::{BoosterKey, DSpin, GaugeAxis, DL_MAX};
