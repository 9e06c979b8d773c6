// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use std::path::PathBuf;

use thiserror::Error;

/// Root error type for all booster engine failures.
///
/// Every variant is fatal to the request that raised it. Nothing is
/// retried internally; callers decide whether to re-issue a request.
#[derive(Error, Debug)]
pub enum BoosterError {
    /// Invalid gauge axis, shell depth, spin or engine configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Cache directory unusable or a stored entry is malformed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Raw filesystem failure while reading or publishing a cache entry.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tensor addressing outside the allocated extents.
    #[error("shape error: {0}")]
    Shape(String),

    /// Block kernel failed or returned a block of the wrong size.
    #[error("kernel error: {0}")]
    Kernel(String),

    /// A cooperating worker failed; the whole collective request is void.
    #[error("collective failure: {0}")]
    Collective(String),
}

impl BoosterError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BoosterError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type BoosterResult<T> = Result<T, BoosterError>;
