// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Booster Resolution Core
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Booster tensor store, cache resolution and the distributed engine
//! that assembles booster tensors from per-quadruple blocks.
//!
//! # Invariants
//!
//! 1. **Entries are immutable**: a tensor is published to the cache
//!    exactly once, under a name derived from its key and the Immirzi
//!    parameter, through an atomic rename. Readers never see partial
//!    files.
//!
//! 2. **Only the coordinator touches storage**: cache search, reduction
//!    and persistence run on rank 0; every other worker learns the
//!    outcome through `Coordinator::agree`.
//!
//! 3. **Workers fail together**: every worker enters every collective
//!    of a request, so a local failure reaches all of them as an error
//!    instead of a deadlock.
//!
//! 4. **Blocks are disjoint**: the block of quadruple `n` is the `n`-th
//!    contiguous chunk of the output, so parallel fills never alias.

pub mod cache;
pub mod coordinator;
pub mod engine;
pub mod partition;
pub mod storage;
pub mod tensor;
pub mod vertex;

pub use cache::{CacheOutcome, CacheResolver};
pub use coordinator::{Coordinator, LocalCoordinator, ThreadGroup, ThreadWorker};
pub use engine::{BoosterEngine, Resolution, ResolveReport, ResolveSource};
pub use partition::WorkPlan;
pub use storage::{BoosterStorage, DiskStorage, InMemoryStorage};
pub use tensor::BoosterTensor;
pub use vertex::{vertex_boosters, VertexBooster, VertexBoosters, VERTEX_BOOSTER_MAP};
