//! Error types for transform invocations.
//!
//! Per-net failures (`Topology`, `Boundary`) are recovered inside the
//! passes: the net is logged and skipped. `AreaExceeded` stops the
//! running pass, which reports the mutations committed so far.
//! Transform-wide failures (`Argument`, `Library`) short-circuit the
//! invocation; the dispatcher maps them to exit code -1.

use thiserror::Error;

use netopt_db::DbError;

/// Errors raised while running a transform.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Unknown or malformed argument vector.
    #[error("argument error: {0}")]
    Argument(String),

    /// A named library cell does not exist.
    #[error("library cell '{0}' not found")]
    Library(String),

    /// Steiner-tree construction failed for a net.
    #[error("topology error: {0}")]
    Topology(String),

    /// A mutation was attempted through a top-level boundary pin.
    #[error("boundary pin not supported: {0}")]
    Boundary(String),

    /// The next mutation would cross the design's area ceiling.
    #[error("maximum area exceeded")]
    AreaExceeded,

    /// Database or timing failure underneath a transform.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl TransformError {
    /// True for per-net conditions that passes log and skip.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Topology(_) | Self::Boundary(_))
    }
}
