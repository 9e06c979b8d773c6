// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Booster Tensor
// ─────────────────────────────────────────────────────────────────────
//! Dense 6-axis column-major tensor with axes `(i, k, la, lb, lc, ld)`.
//!
//! Because the layout is column-major, the `idim × kdim` block of one
//! virtual-spin quadruple is a contiguous slice, and blocks appear in
//! the same order as `ShellRanges::point_at` enumerates quadruples.

use rayon::prelude::*;

use booster_types::{BoosterError, BoosterResult};

/// Owned booster coefficient tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct BoosterTensor {
    dims: [usize; 6],
    data: Vec<f64>,
}

impl BoosterTensor {
    /// Allocate a zero-filled tensor.
    pub fn zeros(dims: [usize; 6]) -> Self {
        Self {
            dims,
            data: vec![0.0; dims.iter().product()],
        }
    }

    /// Wrap an existing column-major buffer.
    pub fn from_parts(dims: [usize; 6], data: Vec<f64>) -> BoosterResult<Self> {
        let expected: usize = dims.iter().product();
        if data.len() != expected {
            return Err(BoosterError::Shape(format!(
                "buffer of {} entries does not match dims {dims:?} ({expected} entries)",
                data.len()
            )));
        }
        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> [usize; 6] {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Entries per virtual-spin block (`dims[0] * dims[1]`).
    pub fn block_len(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    /// Number of virtual-spin blocks.
    pub fn block_count(&self) -> usize {
        self.dims[2..].iter().product()
    }

    fn block_position(&self, l: [usize; 4]) -> BoosterResult<usize> {
        let mut pos = 0;
        let mut stride = 1;
        for (x, &off) in l.iter().enumerate() {
            let extent = self.dims[2 + x];
            if off >= extent {
                return Err(BoosterError::Shape(format!(
                    "block offset {l:?} outside l extents {:?}",
                    &self.dims[2..]
                )));
            }
            pos += off * stride;
            stride *= extent;
        }
        Ok(pos)
    }

    /// Block of the quadruple at l-axis offsets `l`.
    pub fn block(&self, l: [usize; 4]) -> BoosterResult<&[f64]> {
        let n = self.block_len();
        let start = self.block_position(l)? * n;
        Ok(&self.data[start..start + n])
    }

    pub fn block_mut(&mut self, l: [usize; 4]) -> BoosterResult<&mut [f64]> {
        let n = self.block_len();
        let start = self.block_position(l)? * n;
        Ok(&mut self.data[start..start + n])
    }

    /// Disjoint mutable blocks in enumeration order, for rayon.
    pub fn par_blocks_mut(&mut self) -> rayon::slice::ChunksMut<'_, f64> {
        let n = self.block_len().max(1);
        self.data.par_chunks_mut(n)
    }

    /// Single entry at `(i, k, la, lb, lc, ld)`, `None` if out of range.
    pub fn get(&self, idx: [usize; 6]) -> Option<f64> {
        let mut pos = 0;
        let mut stride = 1;
        for (x, &v) in idx.iter().enumerate() {
            if v >= self.dims[x] {
                return None;
            }
            pos += v * stride;
            stride *= self.dims[x];
        }
        self.data.get(pos).copied()
    }

    /// Sub-tensor anchored at the origin with the given extents.
    pub fn restrict(&self, dims: [usize; 6]) -> BoosterResult<BoosterTensor> {
        if dims.iter().zip(self.dims.iter()).any(|(d, s)| d > s) {
            return Err(BoosterError::Shape(format!(
                "cannot restrict dims {:?} to larger {dims:?}",
                self.dims
            )));
        }
        let mut out = BoosterTensor::zeros(dims);
        let mut pos = 0;
        for ld in 0..dims[5] {
            for lc in 0..dims[4] {
                for lb in 0..dims[3] {
                    for la in 0..dims[2] {
                        for k in 0..dims[1] {
                            for i in 0..dims[0] {
                                // In range by construction.
                                out.data[pos] = self.get([i, k, la, lb, lc, ld]).unwrap_or(0.0);
                                pos += 1;
                            }
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Copy the first `n` entries of `src` into `dst`.
///
/// Two booster blocks with the same `idim` share their leading
/// columns, so copying a prefix moves whole `k` columns.
pub(crate) fn copy_prefix(dst: &mut [f64], src: &[f64], n: usize) -> BoosterResult<()> {
    if n > dst.len() || n > src.len() {
        return Err(BoosterError::Shape(format!(
            "cannot copy {n} entries between blocks of {} and {}",
            src.len(),
            dst.len()
        )));
    }
    dst[..n].copy_from_slice(&src[..n]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(dims: [usize; 6]) -> BoosterTensor {
        let n: usize = dims.iter().product();
        BoosterTensor::from_parts(dims, (0..n).map(|v| v as f64).collect()).unwrap()
    }

    #[test]
    fn test_zeros() {
        let t = BoosterTensor::zeros([3, 3, 1, 2, 2, 2]);
        assert_eq!(t.len(), 72);
        assert_eq!(t.block_len(), 9);
        assert_eq!(t.block_count(), 8);
        assert!(t.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_from_parts_length_checked() {
        assert!(matches!(
            BoosterTensor::from_parts([2, 2, 1, 1, 1, 1], vec![0.0; 3]),
            Err(BoosterError::Shape(_))
        ));
    }

    #[test]
    fn test_column_major_get() {
        let t = ramp([2, 3, 2, 1, 1, 2]);
        assert_eq!(t.get([1, 0, 0, 0, 0, 0]), Some(1.0));
        assert_eq!(t.get([0, 1, 0, 0, 0, 0]), Some(2.0));
        assert_eq!(t.get([0, 0, 1, 0, 0, 0]), Some(6.0));
        assert_eq!(t.get([0, 0, 0, 0, 0, 1]), Some(12.0));
        assert_eq!(t.get([2, 0, 0, 0, 0, 0]), None);
    }

    #[test]
    fn test_block_view_contiguous() {
        let t = ramp([2, 2, 2, 1, 1, 2]);
        let b = t.block([1, 0, 0, 1]).unwrap();
        // position = 1 + 2 * (0 + 1 * (0 + 1 * 1)) = 3
        assert_eq!(b, &[12.0, 13.0, 14.0, 15.0]);
    }

    #[test]
    fn test_par_blocks_match_block_views() {
        let mut t = BoosterTensor::zeros([2, 1, 2, 2, 1, 1]);
        t.par_blocks_mut()
            .enumerate()
            .for_each(|(n, block)| block.fill(n as f64));
        assert_eq!(t.block([1, 1, 0, 0]).unwrap(), &[3.0, 3.0]);
        assert_eq!(t.par_blocks_mut().count(), t.block_count());
    }

    #[test]
    fn test_block_out_of_range() {
        let mut t = BoosterTensor::zeros([2, 2, 1, 1, 1, 1]);
        assert!(t.block([0, 1, 0, 0]).is_err());
        assert!(t.block_mut([1, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_restrict_origin_box() {
        let t = ramp([2, 3, 2, 2, 1, 1]);
        let r = t.restrict([2, 2, 1, 2, 1, 1]).unwrap();
        assert_eq!(r.dims(), [2, 2, 1, 2, 1, 1]);
        assert_eq!(r.get([1, 1, 0, 1, 0, 0]), t.get([1, 1, 0, 1, 0, 0]));
        assert!(t.restrict([3, 1, 1, 1, 1, 1]).is_err());
    }

    #[test]
    fn test_copy_prefix_bounds() {
        let src = [1.0, 2.0, 3.0];
        let mut dst = [0.0; 4];
        copy_prefix(&mut dst, &src, 2).unwrap();
        assert_eq!(dst, [1.0, 2.0, 0.0, 0.0]);
        assert!(copy_prefix(&mut dst, &src, 4).is_err());
    }
}
