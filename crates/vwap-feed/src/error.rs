//! Feed error types.

use thiserror::Error;
use vwap_core::CoreError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("Unparseable payload: {0}")]
    Unparseable(String),

    #[error("Invalid {field}: {value:?}")]
    NumericParse { field: &'static str, value: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl FeedError {
    /// Metric label for this error.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unparseable(_) => "unparseable",
            Self::NumericParse { .. } => "numeric_parse",
            Self::Core(CoreError::ZeroCapacity) => "zero_capacity",
            Self::Core(CoreError::EmptyWindow) => "empty_window",
            Self::Core(CoreError::ZeroVolume) => "zero_volume",
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
