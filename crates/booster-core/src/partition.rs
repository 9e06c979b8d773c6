// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Work Partitioner
// ─────────────────────────────────────────────────────────────────────
//! Round-robin split of the virtual-spin space across workers.
//!
//! Quadruples are numbered in enumeration order (`la` fastest); point
//! `n` belongs to worker `n mod size`. The split is static: there is
//! no load balancing between workers. Within a worker, points run on
//! the rayon pool when there are enough of them.

use booster_physics::ShellRanges;
use booster_types::{BoosterError, BoosterResult, DSpin};

/// Below this many owned points a worker fills sequentially.
pub const PARALLEL_THRESHOLD: usize = 4;

/// Number of indices in `0..total` congruent to `rank` mod `size`.
pub fn owned_count(total: usize, rank: usize, size: usize) -> usize {
    if rank >= total {
        0
    } else {
        (total - rank - 1) / size + 1
    }
}

/// The points one worker is responsible for.
#[derive(Debug, Clone)]
pub struct WorkPlan {
    shells: ShellRanges,
    total: usize,
    rank: usize,
    size: usize,
    owned: usize,
    parallel: bool,
}

impl WorkPlan {
    pub fn new(
        shells: ShellRanges,
        rank: usize,
        size: usize,
        parallel_enabled: bool,
    ) -> BoosterResult<Self> {
        if size == 0 || rank >= size {
            return Err(BoosterError::Config(format!(
                "invalid worker rank {rank} for group of {size}"
            )));
        }
        let total = shells.count();
        let owned = owned_count(total, rank, size);
        Ok(Self {
            shells,
            total,
            rank,
            size,
            owned,
            parallel: parallel_enabled && owned >= PARALLEL_THRESHOLD,
        })
    }

    pub fn owns(&self, index: usize) -> bool {
        index % self.size == self.rank
    }

    /// Owned `(index, two_ls)` pairs in enumeration order.
    pub fn points(&self) -> impl Iterator<Item = (usize, [DSpin; 4])> + '_ {
        (self.rank..self.total)
            .step_by(self.size)
            .map(move |n| (n, self.shells.point_at(n)))
    }

    pub fn shells(&self) -> &ShellRanges {
        &self.shells
    }

    /// Size of the whole virtual-spin space.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn owned(&self) -> usize {
        self.owned
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booster_types::GaugeAxis;

    fn shells() -> ShellRanges {
        // 3 × 3 × 3 with la fixed
        ShellRanges::new([2, 2, 2, 2], 2, GaugeAxis::A)
    }

    #[test]
    fn test_partition_complete_and_disjoint() {
        let s = shells();
        let total = s.count();
        for size in 1..=8 {
            let mut hits = vec![0usize; total];
            for rank in 0..size {
                let plan = WorkPlan::new(s, rank, size, true).unwrap();
                let mut n = 0;
                for (idx, two_ls) in plan.points() {
                    assert!(plan.owns(idx));
                    assert_eq!(two_ls, s.point_at(idx));
                    hits[idx] += 1;
                    n += 1;
                }
                assert_eq!(n, plan.owned());
                let (lo, hi) = (total / size, total.div_ceil(size));
                assert!(n == lo || n == hi, "size={size} rank={rank} owned={n}");
            }
            assert!(hits.iter().all(|&h| h == 1), "size={size}: {hits:?}");
        }
    }

    #[test]
    fn test_more_workers_than_points() {
        let s = ShellRanges::new([2, 2, 2, 2], 0, GaugeAxis::A);
        let plan = WorkPlan::new(s, 3, 4, true).unwrap();
        assert_eq!(plan.owned(), 0);
        assert_eq!(plan.points().count(), 0);
        let plan = WorkPlan::new(s, 0, 4, true).unwrap();
        assert_eq!(plan.owned(), 1);
    }

    #[test]
    fn test_parallel_threshold() {
        let s = shells();
        // 27 points over 7 workers: 4 or 3 each
        let busy = WorkPlan::new(s, 0, 7, true).unwrap();
        assert_eq!(busy.owned(), 4);
        assert!(busy.is_parallel());
        let light = WorkPlan::new(s, 6, 7, true).unwrap();
        assert_eq!(light.owned(), 3);
        assert!(!light.is_parallel());
        let disabled = WorkPlan::new(s, 0, 1, false).unwrap();
        assert!(!disabled.is_parallel());
    }

    #[test]
    fn test_invalid_rank() {
        assert!(WorkPlan::new(shells(), 2, 2, true).is_err());
        assert!(WorkPlan::new(shells(), 0, 0, true).is_err());
    }

    #[test]
    fn test_owned_count() {
        assert_eq!(owned_count(10, 0, 3), 4);
        assert_eq!(owned_count(10, 1, 3), 3);
        assert_eq!(owned_count(10, 2, 3), 3);
        assert_eq!(owned_count(0, 0, 1), 0);
    }
}
