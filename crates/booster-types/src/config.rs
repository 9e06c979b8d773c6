// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Engine Configuration
// ─────────────────────────────────────────────────────────────────────

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BoosterError, BoosterResult};
use crate::spin::{BoosterKey, DSpin};

/// Upper bound for `max_two_spin`: sums of two accepted spins must fit a `DSpin`.
pub const MAX_TWO_SPIN_CEILING: DSpin = DSpin::MAX / 4;

/// Runtime configuration for the booster engine.
///
/// Passed to the engine at construction and replaced only through
/// `BoosterEngine::reconfigure`, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterConfig {
    /// Data root. Booster tensors live under `<root_dir>/boosters`.
    pub root_dir: PathBuf,

    /// Barbero-Immirzi parameter. Embedded (3 decimals) in every
    /// cache filename, so entries from different values never mix.
    /// Default: 1.0.
    pub immirzi: f64,

    /// Enable disk I/O: cache lookups and persistence.
    /// Default: true.
    pub store: bool,

    /// Parallelise the fill of one worker's virtual-spin points.
    /// Default: true.
    pub parallel: bool,

    /// Size of a dedicated rayon pool. 0 uses the global pool.
    /// Default: 0.
    pub threads: usize,

    /// Largest doubled spin (boundary or virtual) the engine accepts.
    /// Default: 300.
    pub max_two_spin: DSpin,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("data"),
            immirzi: 1.0,
            store: true,
            parallel: true,
            threads: 0,
            max_two_spin: 3 * 2 * 50,
        }
    }
}

impl BoosterConfig {
    /// Default configuration rooted at `root_dir`.
    pub fn with_root(root_dir: impl AsRef<Path>) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Directory holding the booster cache entries.
    pub fn boosters_dir(&self) -> PathBuf {
        self.root_dir.join("boosters")
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> BoosterResult<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(BoosterError::Config("root_dir must not be empty".to_string()));
        }
        if !self.immirzi.is_finite() || self.immirzi <= 0.0 {
            return Err(BoosterError::Config(format!(
                "immirzi must be finite and > 0, got {}",
                self.immirzi
            )));
        }
        if self.max_two_spin == 0 || self.max_two_spin > MAX_TWO_SPIN_CEILING {
            return Err(BoosterError::Config(format!(
                "max_two_spin must be in 1..={MAX_TWO_SPIN_CEILING}, got {}",
                self.max_two_spin
            )));
        }
        Ok(())
    }

    /// Check that every spin a request touches stays within `max_two_spin`.
    pub fn check_key(&self, key: &BoosterKey) -> BoosterResult<()> {
        let reach = key.max_virtual_spin().ok_or_else(|| {
            BoosterError::Config(format!("{key} reaches a spin beyond the DSpin range"))
        })?;
        if reach > self.max_two_spin {
            return Err(BoosterError::Config(format!(
                "{key} reaches two_j = {reach}, above max_two_spin = {}",
                self.max_two_spin
            )));
        }
        Ok(())
    }

    /// Load from JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> BoosterResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| BoosterError::Config(format!("JSON parse error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(BoosterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_immirzi_rejected() {
        let cfg = BoosterConfig {
            immirzi: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = BoosterConfig {
            immirzi: f64::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_empty_root_rejected() {
        let cfg = BoosterConfig::with_root("");
        assert!(matches!(cfg.validate(), Err(BoosterError::Config(_))));
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = BoosterConfig::from_json(r#"{"root_dir": "/scratch/sl", "immirzi": 0.123}"#)
            .unwrap();
        assert_eq!(cfg.root_dir, PathBuf::from("/scratch/sl"));
        assert!((cfg.immirzi - 0.123).abs() < 1e-12);
        assert!(cfg.store);
        assert_eq!(cfg.max_two_spin, 300);
    }

    #[test]
    fn test_from_json_garbage() {
        assert!(matches!(
            BoosterConfig::from_json("{not json"),
            Err(BoosterError::Config(_))
        ));
    }

    #[test]
    fn test_boosters_dir() {
        let cfg = BoosterConfig::with_root("/data/run1");
        assert_eq!(cfg.boosters_dir(), PathBuf::from("/data/run1/boosters"));
    }

    #[test]
    fn test_check_key_spin_limit() {
        let cfg = BoosterConfig {
            max_two_spin: 10,
            ..Default::default()
        };
        let ok = BoosterKey::from_raw(1, [2, 2, 2, 2], 4).unwrap();
        assert!(cfg.check_key(&ok).is_ok());
        let too_big = BoosterKey::from_raw(1, [2, 2, 2, 2], 5).unwrap();
        assert!(matches!(cfg.check_key(&too_big), Err(BoosterError::Config(_))));
    }

    #[test]
    fn test_check_key_rejects_overflowing_spins() {
        let cfg = BoosterConfig::default();
        for gf in 1..=4 {
            let key = BoosterKey::from_raw(gf, [2, u32::MAX, 2, 2], 1).unwrap();
            assert!(matches!(cfg.check_key(&key), Err(BoosterError::Config(_))), "gf={gf}");
        }
    }

    #[test]
    fn test_max_two_spin_ceiling() {
        let cfg = BoosterConfig {
            max_two_spin: MAX_TWO_SPIN_CEILING,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
        let cfg = BoosterConfig {
            max_two_spin: MAX_TWO_SPIN_CEILING + 1,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BoosterError::Config(_))));
    }
}
