use thiserror::Error;

/// Result type for core value-object construction
pub type Result<T> = std::result::Result<T, CoreError>;

/// Validation errors for core value objects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Commit SHA is not 40 lowercase hex characters
    #[error("invalid commit sha: {0:?}")]
    InvalidSha(String),

    /// Line range with start past end
    #[error("invalid line range: start={start}, end={end}")]
    InvalidRange { start: u32, end: u32 },

    /// Unknown operating mode selector
    #[error("unknown mode: {0:?} (expected bootstrap, index, or review)")]
    UnknownMode(String),
}
