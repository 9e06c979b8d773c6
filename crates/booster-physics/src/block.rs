// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Block Kernel Interface
// ─────────────────────────────────────────────────────────────────────
//! One block of booster coefficients b4(j, l; i, k) for a single
//! virtual-spin quadruple.
//!
//! The real kernel evaluates an SL(2,C) integral per entry and runs
//! behind the `BlockKernel` trait, either in-process or through the
//! FFI layer. The heuristic kernel produces deterministic stand-in
//! coefficients with the right shape for testing and benchmarks.

use booster_types::{BoosterError, BoosterResult, DSpin};

use crate::bounds::IntertwinerRange;

/// Dense column-major matrix, rows = outer `i`, columns = local `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl BlockMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn from_col_major(rows: usize, cols: usize, data: Vec<f64>) -> BoosterResult<Self> {
        if data.len() != rows * cols {
            return Err(BoosterError::Kernel(format!(
                "block data has {} entries, expected {rows}×{cols}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[col * self.rows + row]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[col * self.rows + row] = value;
    }
}

/// Computes one coefficient block.
///
/// Given boundary spins `two_js` and virtual spins `two_ls`, returns an
/// `idim × kdim` matrix where `idim` is the outer range of `two_js` and
/// `kdim` the coupling range of `two_ls`.
///
/// The engine calls this from many rayon workers at once, so
/// implementations must stay single-threaded internally (no nested
/// pools, sequential BLAS).
pub trait BlockKernel: Send + Sync {
    fn compute_block(&self, two_js: [DSpin; 4], two_ls: [DSpin; 4]) -> BoosterResult<BlockMatrix>;
}

/// Deterministic heuristic kernel (no integration).
///
/// Entries decay with the shell distance `Σ(l - j)/2` and alternate in
/// sign with `(i + k)/2`. Used for tests, benchmarks and as the default
/// kernel of the Python bindings.
pub struct HeuristicKernel;

impl HeuristicKernel {
    fn coefficient(two_i: DSpin, two_k: DSpin, shell: f64) -> f64 {
        let magnitude = ((two_i as f64 + 1.0) * (two_k as f64 + 1.0)).sqrt();
        let sign = if ((two_i + two_k) / 2) % 2 == 0 { 1.0 } else { -1.0 };
        sign * magnitude * (-0.25 * shell).exp() / (1.0 + shell)
    }
}

impl BlockKernel for HeuristicKernel {
    fn compute_block(&self, two_js: [DSpin; 4], two_ls: [DSpin; 4]) -> BoosterResult<BlockMatrix> {
        let i_range = IntertwinerRange::coupling(two_js);
        let k_range = IntertwinerRange::coupling(two_ls);
        let shell: f64 = two_js
            .iter()
            .zip(two_ls.iter())
            .map(|(&j, &l)| l.saturating_sub(j) as f64 / 2.0)
            .sum();

        let mut block = BlockMatrix::zeros(i_range.len(), k_range.len());
        for (col, two_k) in k_range.iter().enumerate() {
            for (row, two_i) in i_range.iter().enumerate() {
                block.set(row, col, Self::coefficient(two_i, two_k, shell));
            }
        }
        Ok(block)
    }
}

type BlockFn = Box<dyn Fn([DSpin; 4], [DSpin; 4]) -> BoosterResult<BlockMatrix> + Send + Sync>;

/// Kernel backed by a closure.
///
/// Used by the PyO3 layer to delegate the integral back to Python, and
/// for instrumenting kernel calls.
pub struct ExternalKernel {
    block_fn: BlockFn,
}

impl ExternalKernel {
    pub fn new(
        block_fn: impl Fn([DSpin; 4], [DSpin; 4]) -> BoosterResult<BlockMatrix> + Send + Sync + 'static,
    ) -> Self {
        Self {
            block_fn: Box::new(block_fn),
        }
    }
}

impl BlockKernel for ExternalKernel {
    fn compute_block(&self, two_js: [DSpin; 4], two_ls: [DSpin; 4]) -> BoosterResult<BlockMatrix> {
        (self.block_fn)(two_js, two_ls)
    }
}
