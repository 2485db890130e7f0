//! Error types for database and timing queries.

use thiserror::Error;

use crate::ids::PinId;

/// Errors surfaced by the database facade and bound timing engines.
#[derive(Debug, Error)]
pub enum DbError {
    /// A named design or library object does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Object category ("library cell", "net", "port", ...).
        kind: &'static str,
        /// The offending name.
        name: String,
    },

    /// The requested mutation is not supported on this object, e.g.
    /// rewiring a top-level boundary pin.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A timing query produced a negative or non-finite quantity.
    #[error("timing unavailable for pin {pin}")]
    TimingUnavailable {
        /// The queried pin.
        pin: PinId,
    },
}

impl DbError {
    /// Create a not-found error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}
