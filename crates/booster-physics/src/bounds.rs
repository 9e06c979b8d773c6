// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Bounds Calculator
// ─────────────────────────────────────────────────────────────────────
//! Index ranges of a booster tensor.
//!
//! For boundary spins `(ja, jb, jc, jd)`, gauge axis `gf` and shell
//! depth `Dl`:
//!
//!   i ∈ [max(|ja-jb|, |jc-jd|), min(ja+jb, jc+jd)]           (outer)
//!   l_x ∈ [j_x, j_x + 2·Dl]   (x ≠ gf),   l_gf = j_gf         (virtual)
//!   k ∈ [max(|la-lb|, |lc-ld|), min(la+lb, lc+ld)]           (per point)
//!
//! All bounds are doubled spins stepping by 2. The k axis of the tensor
//! is sized by the longest k range over every reachable point; shorter
//! ranges occupy the leading columns of their block.

use serde::{Deserialize, Serialize};

use booster_types::{BoosterKey, DSpin, GaugeAxis};

/// Closed range of doubled intertwiner spins, possibly empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntertwinerRange {
    pub two_min: DSpin,
    pub two_max: DSpin,
}

impl IntertwinerRange {
    /// Spins allowed when coupling `(a, b)` and `(c, d)` to a common value.
    pub fn coupling(two_js: [DSpin; 4]) -> Self {
        let [a, b, c, d] = two_js;
        Self {
            two_min: a.abs_diff(b).max(c.abs_diff(d)),
            two_max: a.saturating_add(b).min(c.saturating_add(d)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.two_max < self.two_min
    }

    /// Number of allowed values (0 when empty).
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            ((self.two_max - self.two_min) / 2 + 1) as usize
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = DSpin> {
        (self.two_min..=self.two_max).step_by(2)
    }
}

/// Per-axis virtual-spin ranges of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellRanges {
    pub two_l_min: [DSpin; 4],
    pub two_l_max: [DSpin; 4],
}

impl ShellRanges {
    pub fn new(two_js: [DSpin; 4], dl: u32, gauge: GaugeAxis) -> Self {
        let mut two_l_max = two_js;
        for (x, l) in two_l_max.iter_mut().enumerate() {
            if x != gauge.position() {
                *l += 2 * dl;
            }
        }
        Self {
            two_l_min: two_js,
            two_l_max,
        }
    }

    /// Number of values along each of the four axes.
    pub fn extents(&self) -> [usize; 4] {
        let mut ext = [0usize; 4];
        for (x, e) in ext.iter_mut().enumerate() {
            *e = ((self.two_l_max[x] - self.two_l_min[x]) / 2 + 1) as usize;
        }
        ext
    }

    /// Total number of virtual-spin quadruples.
    pub fn count(&self) -> usize {
        self.extents().iter().product()
    }

    /// True if every component of `two_ls` lies inside its axis range.
    pub fn contains(&self, two_ls: [DSpin; 4]) -> bool {
        (0..4).all(|x| {
            two_ls[x] >= self.two_l_min[x]
                && two_ls[x] <= self.two_l_max[x]
                && (two_ls[x] - self.two_l_min[x]) % 2 == 0
        })
    }

    /// Axis offsets of `two_ls` relative to the range minima.
    ///
    /// Callers guarantee `two_ls` is reachable from the minima.
    pub fn offsets(&self, two_ls: [DSpin; 4]) -> [usize; 4] {
        let mut off = [0usize; 4];
        for (x, o) in off.iter_mut().enumerate() {
            *o = (two_ls[x].saturating_sub(self.two_l_min[x]) / 2) as usize;
        }
        off
    }

    /// Quadruple at position `index` of the enumeration order.
    ///
    /// `la` varies fastest, `ld` slowest, so `index` is also the
    /// position of the point's block in a column-major booster tensor.
    pub fn point_at(&self, index: usize) -> [DSpin; 4] {
        let ext = self.extents();
        let mut rest = index;
        let mut two_ls = [0; 4];
        for x in 0..4 {
            let off = rest % ext[x];
            rest /= ext[x];
            two_ls[x] = self.two_l_min[x] + 2 * off as DSpin;
        }
        two_ls
    }

    /// Every quadruple, outermost `ld` down to innermost `la`.
    pub fn iter(&self) -> impl Iterator<Item = [DSpin; 4]> + '_ {
        (0..self.count()).map(move |n| self.point_at(n))
    }
}

/// All ranges needed to allocate and fill one booster tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoosterBounds {
    pub two_js: [DSpin; 4],
    pub gauge: GaugeAxis,
    pub dl: u32,
    /// Outer intertwiner range (tensor axis 0). Independent of `dl`.
    pub i_range: IntertwinerRange,
    pub shells: ShellRanges,
    /// Longest local k range over all reachable quadruples (axis 1).
    pub kdim_absmax: usize,
    /// Smallest local k minimum over non-empty ranges.
    pub two_k_absmin: DSpin,
    /// Largest local k maximum over non-empty ranges.
    pub two_k_absmax: DSpin,
}

impl BoosterBounds {
    pub fn compute(two_js: [DSpin; 4], dl: u32, gauge: GaugeAxis) -> Self {
        let i_range = IntertwinerRange::coupling(two_js);
        let shells = ShellRanges::new(two_js, dl, gauge);

        let mut kdim_absmax = 0usize;
        let mut two_k_absmin = DSpin::MAX;
        let mut two_k_absmax = 0;
        for two_ls in shells.iter() {
            let k = IntertwinerRange::coupling(two_ls);
            if k.is_empty() {
                continue;
            }
            kdim_absmax = kdim_absmax.max(k.len());
            two_k_absmin = two_k_absmin.min(k.two_min);
            two_k_absmax = two_k_absmax.max(k.two_max);
        }
        if kdim_absmax == 0 {
            two_k_absmin = 0;
        }

        log::trace!(
            "bounds {two_js:?} gf={gauge} dl={dl}: idim={} kdim_absmax={kdim_absmax}",
            i_range.len()
        );

        Self {
            two_js,
            gauge,
            dl,
            i_range,
            shells,
            kdim_absmax,
            two_k_absmin,
            two_k_absmax,
        }
    }

    pub fn for_key(key: &BoosterKey) -> Self {
        Self::compute(key.two_js, key.dl, key.gauge)
    }

    pub fn idim(&self) -> usize {
        self.i_range.len()
    }

    /// Nothing to compute: no outer intertwiner or no inner one anywhere.
    pub fn is_degenerate(&self) -> bool {
        self.kdim_absmax == 0 || self.i_range.is_empty()
    }

    /// Entries in one virtual-spin block (`idim × kdim_absmax`).
    pub fn block_len(&self) -> usize {
        self.idim() * self.kdim_absmax
    }

    /// Extents of the six tensor axes `(i, k, la, lb, lc, ld)`.
    pub fn tensor_dims(&self) -> [usize; 6] {
        let [a, b, c, d] = self.shells.extents();
        [self.idim(), self.kdim_absmax, a, b, c, d]
    }
}
