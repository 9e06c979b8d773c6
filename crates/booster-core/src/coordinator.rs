// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Distributed Coordinator
// ─────────────────────────────────────────────────────────────────────
//! Collective operations between cooperating workers.
//!
//! The engine needs exactly two collectives, both rooted at rank 0:
//! - `agree`: the coordinator's value is delivered to every worker
//!   (cache outcome, final tensor).
//! - `combine`: element-wise sum of every worker's partial buffer,
//!   delivered to the coordinator.
//!
//! Every worker must enter every collective in the same order, even
//! after a local failure; failures travel through the collective so
//! that all workers fail together instead of deadlocking.

use std::any::Any;
use std::sync::{Arc, Barrier};

use parking_lot::Mutex;

use booster_types::{BoosterError, BoosterResult};

/// Rank that searches the cache, reduces and persists.
pub const COORDINATOR_RANK: usize = 0;

/// Collective operations over a fixed group of workers.
pub trait Coordinator: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR_RANK
    }

    /// Broadcast the coordinator's `value` to all workers.
    ///
    /// The coordinator passes `Some`; other workers pass `None`.
    fn agree<T: Clone + Send + Sync + 'static>(&self, value: Option<T>) -> BoosterResult<T>;

    /// Sum partial buffers at the coordinator.
    ///
    /// Returns `Some(total)` on the coordinator and `None` elsewhere.
    /// If any worker contributes an error, every worker gets
    /// `BoosterError::Collective`.
    fn combine(&self, partial: BoosterResult<Vec<f64>>) -> BoosterResult<Option<Vec<f64>>>;
}

/// Single-process coordinator: one worker, identity collectives.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCoordinator;

impl Coordinator for LocalCoordinator {
    fn rank(&self) -> usize {
        COORDINATOR_RANK
    }

    fn size(&self) -> usize {
        1
    }

    fn agree<T: Clone + Send + Sync + 'static>(&self, value: Option<T>) -> BoosterResult<T> {
        value.ok_or_else(|| BoosterError::Collective("coordinator has no value to share".into()))
    }

    fn combine(&self, partial: BoosterResult<Vec<f64>>) -> BoosterResult<Option<Vec<f64>>> {
        partial.map(Some)
    }
}

type Slot = Option<Box<dyn Any + Send + Sync>>;

struct GroupShared {
    size: usize,
    barrier: Barrier,
    broadcast: Mutex<Slot>,
    partials: Mutex<Vec<Option<Result<Vec<f64>, String>>>>,
}

/// In-process worker group: each `ThreadWorker` is meant to run on its
/// own thread and behaves like one rank of a distributed job.
pub struct ThreadGroup;

impl ThreadGroup {
    /// Create `size` connected workers, ranks `0..size`.
    pub fn workers(size: usize) -> BoosterResult<Vec<ThreadWorker>> {
        if size == 0 {
            return Err(BoosterError::Config("worker group must not be empty".into()));
        }
        let shared = Arc::new(GroupShared {
            size,
            barrier: Barrier::new(size),
            broadcast: Mutex::new(None),
            partials: Mutex::new(vec![None; size]),
        });
        Ok((0..size)
            .map(|rank| ThreadWorker {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect())
    }
}

/// One rank of a [`ThreadGroup`].
pub struct ThreadWorker {
    rank: usize,
    shared: Arc<GroupShared>,
}

impl Coordinator for ThreadWorker {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn agree<T: Clone + Send + Sync + 'static>(&self, value: Option<T>) -> BoosterResult<T> {
        if self.is_coordinator() {
            *self.shared.broadcast.lock() =
                value.map(|v| Box::new(v) as Box<dyn Any + Send + Sync>);
        }
        self.shared.barrier.wait();
        let received = self
            .shared
            .broadcast
            .lock()
            .as_ref()
            .and_then(|b| b.downcast_ref::<T>())
            .cloned();
        // Nobody may overwrite the slot until every rank has read it.
        self.shared.barrier.wait();
        if self.is_coordinator() {
            *self.shared.broadcast.lock() = None;
        }
        received.ok_or_else(|| {
            BoosterError::Collective(format!(
                "rank {} received no value from the coordinator",
                self.rank
            ))
        })
    }

    fn combine(&self, partial: BoosterResult<Vec<f64>>) -> BoosterResult<Option<Vec<f64>>> {
        let partial = partial.map_err(|e| match e {
            BoosterError::Collective(msg) => msg,
            other => other.to_string(),
        });
        self.shared.partials.lock()[self.rank] = Some(partial);
        self.shared.barrier.wait();

        let result = {
            let partials = self.shared.partials.lock();
            check_partials(&partials).map(|len| {
                if self.is_coordinator() {
                    let mut total = vec![0.0; len];
                    for buf in partials.iter().flatten().flatten() {
                        for (t, v) in total.iter_mut().zip(buf.iter()) {
                            *t += v;
                        }
                    }
                    Some(total)
                } else {
                    None
                }
            })
        };
        self.shared.barrier.wait();

        if let Err(e) = &result {
            log::error!("rank {}: {e}", self.rank);
        }
        result
    }
}

/// Common buffer length, or the first failure among the contributions.
fn check_partials(partials: &[Option<Result<Vec<f64>, String>>]) -> BoosterResult<usize> {
    let mut len = None;
    for (rank, slot) in partials.iter().enumerate() {
        match slot {
            None => {
                return Err(BoosterError::Collective(format!(
                    "rank {rank} contributed nothing"
                )))
            }
            Some(Err(msg)) => {
                return Err(BoosterError::Collective(format!("rank {rank} failed: {msg}")))
            }
            Some(Ok(buf)) => match len {
                None => len = Some(buf.len()),
                Some(n) if n != buf.len() => {
                    return Err(BoosterError::Collective(format!(
                        "rank {rank} contributed {} entries, expected {n}",
                        buf.len()
                    )))
                }
                Some(_) => {}
            },
        }
    }
    Ok(len.unwrap_or(0))
}
