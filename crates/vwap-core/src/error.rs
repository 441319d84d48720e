//! Error types for vwap-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Window capacity must be greater than zero")]
    ZeroCapacity,

    #[error("Window holds no samples")]
    EmptyWindow,

    #[error("Cumulative window volume is zero")]
    ZeroVolume,
}

/// Result type alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
