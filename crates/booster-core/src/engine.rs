// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Booster Resolution Engine
// ─────────────────────────────────────────────────────────────────────
//! Nine-step resolution of one booster request:
//!   1. Bounds; degenerate requests return no tensor
//!   2. Cache lookup on the coordinator, outcome agreed by all workers
//!   3. Exact hit: return the stored tensor
//!   4. Allocate the zeroed output
//!   5. Plan this worker's share of the virtual-spin points
//!   6. Fill owned blocks: copy from a partial hit or compute
//!   7. Sum partial outputs at the coordinator
//!   8. Persist on the coordinator if requested
//!   9. Broadcast the complete tensor to every worker

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;

use booster_physics::{BlockKernel, BoosterBounds, IntertwinerRange, ShellRanges};
use booster_types::{BoosterConfig, BoosterError, BoosterKey, BoosterResult, DSpin};

use crate::cache::{CacheOutcome, CacheResolver};
use crate::coordinator::{Coordinator, LocalCoordinator};
use crate::partition::WorkPlan;
use crate::storage::{BoosterStorage, DiskStorage};
use crate::tensor::{copy_prefix, BoosterTensor};

/// Where the returned tensor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveSource {
    /// Empty index space; no tensor.
    Degenerate,
    /// Loaded from the cache as is.
    ExactHit,
    /// Assembled reusing a stored tensor of shell depth `dl`.
    PartialHit { dl: u32 },
    /// Computed from scratch.
    #[default]
    Computed,
}

/// Per-worker account of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveReport {
    pub source: ResolveSource,
    /// Blocks this worker computed with the kernel.
    pub computed: usize,
    /// Blocks this worker copied from a partial hit.
    pub copied: usize,
    /// Owned points with an empty local k range.
    pub skipped: usize,
    /// True if this worker wrote the tensor to storage.
    pub persisted: bool,
}

/// Resolved tensor plus the report of how it was obtained.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub tensor: Option<BoosterTensor>,
    pub report: ResolveReport,
}

enum Fill {
    Computed,
    Copied,
    Skipped,
}

/// A stored tensor of another shell depth being reused.
struct Reuse<'a> {
    tensor: &'a BoosterTensor,
    dl: u32,
    shells: ShellRanges,
    kdim: usize,
}

impl<'a> Reuse<'a> {
    fn new(tensor: &'a BoosterTensor, dl: u32, key: &BoosterKey) -> Self {
        Self {
            tensor,
            dl,
            shells: ShellRanges::new(key.two_js, dl, key.gauge),
            kdim: tensor.dims()[1],
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

fn build_pool(config: &BoosterConfig) -> BoosterResult<Option<rayon::ThreadPool>> {
    if config.threads == 0 {
        return Ok(None);
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .thread_name(|i| format!("booster-{i}"))
        .build()
        .map(Some)
        .map_err(|e| BoosterError::Config(format!("cannot build thread pool: {e}")))
}

/// Booster resolution engine for one worker.
///
/// In a multi-worker job every worker owns one engine built with its
/// own `Coordinator`, and all workers issue the same requests in the
/// same order.
pub struct BoosterEngine<C: Coordinator = LocalCoordinator> {
    config: BoosterConfig,
    kernel: Arc<dyn BlockKernel>,
    storage: Option<Arc<dyn BoosterStorage>>,
    disk_backed: bool,
    coordinator: C,
    pool: Option<rayon::ThreadPool>,
}

impl BoosterEngine<LocalCoordinator> {
    /// Single-process engine backed by the on-disk cache of `config`.
    pub fn new(config: BoosterConfig, kernel: Arc<dyn BlockKernel>) -> BoosterResult<Self> {
        Self::with_coordinator(config, kernel, LocalCoordinator)
    }
}

impl<C: Coordinator> BoosterEngine<C> {
    /// Disk-backed engine for one worker of a group.
    ///
    /// Only the coordinator opens the cache directory.
    pub fn with_coordinator(
        config: BoosterConfig,
        kernel: Arc<dyn BlockKernel>,
        coordinator: C,
    ) -> BoosterResult<Self> {
        config.validate()?;
        let storage = Self::open_disk(&config, &coordinator)?;
        Ok(Self {
            pool: build_pool(&config)?,
            config,
            kernel,
            storage,
            disk_backed: true,
            coordinator,
        })
    }

    /// Engine over a caller-provided storage backend.
    pub fn with_storage(
        config: BoosterConfig,
        kernel: Arc<dyn BlockKernel>,
        storage: Arc<dyn BoosterStorage>,
        coordinator: C,
    ) -> BoosterResult<Self> {
        config.validate()?;
        Ok(Self {
            pool: build_pool(&config)?,
            config,
            kernel,
            storage: Some(storage),
            disk_backed: false,
            coordinator,
        })
    }

    fn open_disk(
        config: &BoosterConfig,
        coordinator: &C,
    ) -> BoosterResult<Option<Arc<dyn BoosterStorage>>> {
        if config.store && coordinator.is_coordinator() {
            Ok(Some(Arc::new(DiskStorage::open(config)?)))
        } else {
            Ok(None)
        }
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &C {
        &self.coordinator
    }

    pub fn workers(&self) -> usize {
        self.coordinator.size()
    }

    pub fn is_distributed(&self) -> bool {
        self.coordinator.size() > 1
    }

    /// Replace the configuration.
    ///
    /// Rebuilds the thread pool and, for disk-backed engines, reopens
    /// the cache directory for the new root and Immirzi value.
    pub fn reconfigure(&mut self, config: BoosterConfig) -> BoosterResult<()> {
        config.validate()?;
        let pool = build_pool(&config)?;
        if self.disk_backed {
            self.storage = Self::open_disk(&config, &self.coordinator)?;
        }
        self.pool = pool;
        self.config = config;
        log::info!("booster engine reconfigured: {:?}", self.config);
        Ok(())
    }

    /// Storage visible to this worker, if I/O is enabled.
    fn storage(&self) -> Option<&dyn BoosterStorage> {
        if self.config.store && self.coordinator.is_coordinator() {
            self.storage.as_deref()
        } else {
            None
        }
    }

    /// Load a stored tensor directly, without computing anything.
    pub fn load(&self, key: &BoosterKey) -> BoosterResult<BoosterTensor> {
        let storage = self.storage().ok_or_else(|| {
            BoosterError::Storage(format!("{key}: storage is not available on this worker"))
        })?;
        CacheResolver::new(storage).load_checked(key)
    }

    /// Resolve a booster tensor from raw request parameters.
    ///
    /// Returns `None` for degenerate spins.
    pub fn resolve_tensor(
        &self,
        gf: u8,
        two_js: [DSpin; 4],
        dl: u32,
        persist: bool,
    ) -> BoosterResult<Option<BoosterTensor>> {
        let key = BoosterKey::from_raw(gf, two_js, dl)?;
        Ok(self.resolve(&key, persist)?.tensor)
    }

    /// Resolve a booster tensor, reporting how it was obtained.
    pub fn resolve(&self, key: &BoosterKey, persist: bool) -> BoosterResult<Resolution> {
        self.config.check_key(key)?;

        let bounds = BoosterBounds::for_key(key);
        if bounds.is_degenerate() {
            log::debug!("{key}: degenerate, nothing to compute");
            return Ok(Resolution {
                tensor: None,
                report: ResolveReport {
                    source: ResolveSource::Degenerate,
                    ..Default::default()
                },
            });
        }

        let lookup = self.coordinator.is_coordinator().then(|| self.lookup(key));
        let outcome = self.share("cache lookup", lookup)?;

        let found = match outcome {
            CacheOutcome::ExactHit(tensor) => {
                log::debug!("{key}: exact cache hit");
                return Ok(Resolution {
                    tensor: Some(tensor),
                    report: ResolveReport {
                        source: ResolveSource::ExactHit,
                        ..Default::default()
                    },
                });
            }
            CacheOutcome::PartialHit { tensor, dl } => Some((tensor, dl)),
            CacheOutcome::Miss => None,
        };
        let reuse = found
            .as_ref()
            .map(|(tensor, dl)| Reuse::new(tensor, *dl, key));

        let mut output = BoosterTensor::zeros(bounds.tensor_dims());
        let plan = WorkPlan::new(
            bounds.shells,
            self.coordinator.rank(),
            self.coordinator.size(),
            self.config.parallel,
        )?;
        log::debug!(
            "{key}: rank {} owns {}/{} points (parallel={})",
            self.coordinator.rank(),
            plan.owned(),
            plan.total(),
            plan.is_parallel()
        );

        let mut report = match self.fill(&bounds, &plan, reuse.as_ref(), &mut output) {
            Ok(report) => report,
            Err(e) => {
                let _ = self
                    .coordinator
                    .combine(Err(BoosterError::Collective(e.to_string())));
                return Err(e);
            }
        };
        report.source = match &reuse {
            Some(r) => ResolveSource::PartialHit { dl: r.dl },
            None => ResolveSource::Computed,
        };
        drop(reuse);
        drop(found);

        let total = self.coordinator.combine(Ok(output.into_data()))?;
        let published = total.map(|data| self.publish(key, &bounds, data, persist, &mut report));
        let data = self.share("publication", published)?;

        log::info!(
            "{key}: resolved on rank {} (computed {}, copied {}, skipped {})",
            self.coordinator.rank(),
            report.computed,
            report.copied,
            report.skipped
        );
        Ok(Resolution {
            tensor: Some(BoosterTensor::from_parts(bounds.tensor_dims(), data)?),
            report,
        })
    }

    fn lookup(&self, key: &BoosterKey) -> BoosterResult<CacheOutcome> {
        match self.storage() {
            Some(storage) => CacheResolver::new(storage).resolve(key),
            None => Ok(CacheOutcome::Miss),
        }
    }

    /// Coordinator-side tail: wrap the reduced buffer and persist it.
    fn publish(
        &self,
        key: &BoosterKey,
        bounds: &BoosterBounds,
        data: Vec<f64>,
        persist: bool,
        report: &mut ResolveReport,
    ) -> BoosterResult<Vec<f64>> {
        let tensor = BoosterTensor::from_parts(bounds.tensor_dims(), data)?;
        if persist {
            match self.storage() {
                Some(storage) => {
                    storage.save(key, &tensor)?;
                    report.persisted = true;
                }
                None => log::warn!("{key}: persistence requested but storage is disabled"),
            }
        }
        Ok(tensor.into_data())
    }

    /// Broadcast the coordinator's result; its failure fails every worker.
    fn share<T: Clone + Send + Sync + 'static>(
        &self,
        stage: &str,
        local: Option<BoosterResult<T>>,
    ) -> BoosterResult<T> {
        match local {
            Some(Ok(value)) => self
                .coordinator
                .agree(Some(Ok::<T, String>(value)))?
                .map_err(BoosterError::Collective),
            Some(Err(e)) => {
                let _ = self.coordinator.agree(Some(Err::<T, String>(e.to_string())));
                Err(e)
            }
            None => self
                .coordinator
                .agree::<Result<T, String>>(None)?
                .map_err(|msg| {
                    BoosterError::Collective(format!("coordinator failed during {stage}: {msg}"))
                }),
        }
    }

    /// Fill this worker's blocks of `output`.
    fn fill(
        &self,
        bounds: &BoosterBounds,
        plan: &WorkPlan,
        reuse: Option<&Reuse<'_>>,
        output: &mut BoosterTensor,
    ) -> BoosterResult<ResolveReport> {
        let filled = if plan.is_parallel() {
            let fill_one = |(index, block): (usize, &mut [f64])| {
                self.fill_block(bounds, plan.shells().point_at(index), reuse, block)
            };
            let mut run = || {
                output
                    .par_blocks_mut()
                    .enumerate()
                    .filter(|(index, _)| plan.owns(*index))
                    .map(fill_one)
                    .collect::<BoosterResult<Vec<_>>>()
            };
            match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        } else {
            plan.points()
                .map(|(_, two_ls)| {
                    let block = output.block_mut(plan.shells().offsets(two_ls))?;
                    self.fill_block(bounds, two_ls, reuse, block)
                })
                .collect::<BoosterResult<Vec<_>>>()
        };

        let mut report = ResolveReport::default();
        for fill in filled? {
            match fill {
                Fill::Computed => report.computed += 1,
                Fill::Copied => report.copied += 1,
                Fill::Skipped => report.skipped += 1,
            }
        }
        Ok(report)
    }

    /// Fill the block of one virtual-spin quadruple.
    fn fill_block(
        &self,
        bounds: &BoosterBounds,
        two_ls: [DSpin; 4],
        reuse: Option<&Reuse<'_>>,
        block: &mut [f64],
    ) -> BoosterResult<Fill> {
        if let Some(reuse) = reuse {
            // A deeper tensor holds every point; a shallower one only some.
            if reuse.dl > bounds.dl || reuse.shells.contains(two_ls) {
                let src = reuse.tensor.block(reuse.shells.offsets(two_ls))?;
                let n = bounds.idim() * bounds.kdim_absmax.min(reuse.kdim);
                copy_prefix(block, src, n)?;
                return Ok(Fill::Copied);
            }
        }

        let k_range = IntertwinerRange::coupling(two_ls);
        if k_range.is_empty() {
            return Ok(Fill::Skipped);
        }

        // A panicking kernel must not skip the collectives of this worker.
        let computed = panic::catch_unwind(AssertUnwindSafe(|| {
            self.kernel.compute_block(bounds.two_js, two_ls)
        }))
        .map_err(|payload| {
            log::error!("block kernel panicked for ls={two_ls:?}");
            BoosterError::Kernel(format!(
                "kernel panicked for ls={two_ls:?}: {}",
                panic_message(payload.as_ref())
            ))
        })??;
        if let Some(bad) = computed.data().iter().find(|v| !v.is_finite()) {
            return Err(BoosterError::Kernel(format!(
                "non-finite entry {bad} in block for ls={two_ls:?}"
            )));
        }
        if computed.rows() != bounds.idim() || computed.cols() != k_range.len() {
            return Err(BoosterError::Kernel(format!(
                "block for ls={two_ls:?} is {}×{}, expected {}×{}",
                computed.rows(),
                computed.cols(),
                bounds.idim(),
                k_range.len()
            )));
        }
        copy_prefix(block, computed.data(), computed.data().len())?;
        Ok(Fill::Computed)
    }
}
