// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Spin Labels and Request Keys
// ─────────────────────────────────────────────────────────────────────
//! All spins are carried in doubled units (`two_j = 2 * j`) so that
//! half-integers stay exact. A virtual spin always moves in steps of
//! 2 in this representation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BoosterError, BoosterResult};

/// Twice a half-integer spin.
pub type DSpin = u32;

/// Maximum number of shells a request may ask for.
pub const DL_MAX: u32 = 50;

/// Which of the four boundary spins is held fixed (not shelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GaugeAxis {
    A,
    B,
    C,
    D,
}

impl GaugeAxis {
    pub const ALL: [GaugeAxis; 4] = [GaugeAxis::A, GaugeAxis::B, GaugeAxis::C, GaugeAxis::D];

    /// Parse the 1-based gauge index used by callers (`gf` in 1..=4).
    pub fn from_index(gf: u8) -> BoosterResult<Self> {
        match gf {
            1 => Ok(GaugeAxis::A),
            2 => Ok(GaugeAxis::B),
            3 => Ok(GaugeAxis::C),
            4 => Ok(GaugeAxis::D),
            other => Err(BoosterError::Config(format!(
                "gauge-fixed index must be 1 to 4, got {other}"
            ))),
        }
    }

    /// 1-based index, as embedded in cache filenames.
    pub fn index(self) -> u8 {
        self.position() as u8 + 1
    }

    /// 0-based axis position among the four virtual spins.
    pub fn position(self) -> usize {
        match self {
            GaugeAxis::A => 0,
            GaugeAxis::B => 1,
            GaugeAxis::C => 2,
            GaugeAxis::D => 3,
        }
    }
}

impl fmt::Display for GaugeAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A validated booster request: gauge axis, boundary spins, shell depth.
///
/// Doubles as the cache key; two requests with equal keys resolve to
/// the same stored tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoosterKey {
    pub gauge: GaugeAxis,
    pub two_js: [DSpin; 4],
    pub dl: u32,
}

impl BoosterKey {
    pub fn new(gauge: GaugeAxis, two_js: [DSpin; 4], dl: u32) -> BoosterResult<Self> {
        if dl > DL_MAX {
            return Err(BoosterError::Config(format!(
                "too many shells requested ({dl}), maximum is {DL_MAX} shells"
            )));
        }
        Ok(Self { gauge, two_js, dl })
    }

    /// Build from the raw 1-based gauge index.
    pub fn from_raw(gf: u8, two_js: [DSpin; 4], dl: u32) -> BoosterResult<Self> {
        Self::new(GaugeAxis::from_index(gf)?, two_js, dl)
    }

    /// Same spins and gauge, different shell depth.
    pub fn with_dl(&self, dl: u32) -> BoosterResult<Self> {
        Self::new(self.gauge, self.two_js, dl)
    }

    /// Largest doubled spin any virtual spin of this request can reach.
    ///
    /// `None` if it does not fit a `DSpin`.
    pub fn max_virtual_spin(&self) -> Option<DSpin> {
        let shell = self.dl.checked_mul(2)?;
        let mut reach = self.two_js[self.gauge.position()];
        for (x, &j) in self.two_js.iter().enumerate() {
            if x != self.gauge.position() {
                reach = reach.max(j.checked_add(shell)?);
            }
        }
        Some(reach)
    }
}

impl fmt::Display for BoosterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [ja, jb, jc, jd] = self.two_js;
        write!(f, "b4({ja},{jb},{jc},{jd}; gf={}, dl={})", self.gauge, self.dl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_roundtrip() {
        for axis in GaugeAxis::ALL {
            assert_eq!(GaugeAxis::from_index(axis.index()).unwrap(), axis);
        }
    }

    #[test]
    fn test_gauge_out_of_range() {
        assert!(matches!(GaugeAxis::from_index(0), Err(BoosterError::Config(_))));
        assert!(matches!(GaugeAxis::from_index(5), Err(BoosterError::Config(_))));
    }

    #[test]
    fn test_key_rejects_too_many_shells() {
        let err = BoosterKey::from_raw(1, [2, 2, 2, 2], DL_MAX + 1).unwrap_err();
        assert!(matches!(err, BoosterError::Config(_)));
        assert!(BoosterKey::from_raw(1, [2, 2, 2, 2], DL_MAX).is_ok());
    }

    #[test]
    fn test_max_virtual_spin_skips_gauge_axis() {
        let key = BoosterKey::from_raw(1, [20, 2, 4, 6], 3).unwrap();
        // a is fixed at 20; d reaches 6 + 6 = 12
        assert_eq!(key.max_virtual_spin(), Some(20));
        let key = BoosterKey::from_raw(2, [20, 2, 4, 6], 3).unwrap();
        assert_eq!(key.max_virtual_spin(), Some(26));
    }

    #[test]
    fn test_max_virtual_spin_overflow() {
        let key = BoosterKey::from_raw(1, [2, u32::MAX, 2, 2], 1).unwrap();
        assert_eq!(key.max_virtual_spin(), None);
        // the gauge axis is not shelled, so it cannot overflow
        let key = BoosterKey::from_raw(2, [2, u32::MAX, 2, 2], 1).unwrap();
        assert_eq!(key.max_virtual_spin(), Some(u32::MAX));
    }

    #[test]
    fn test_key_display() {
        let key = BoosterKey::from_raw(3, [1, 2, 3, 4], 0).unwrap();
        assert_eq!(key.to_string(), "b4(1,2,3,4; gf=3, dl=0)");
    }
}
