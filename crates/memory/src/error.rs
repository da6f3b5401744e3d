use thiserror::Error;

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors from pattern analysis and profile maintenance
#[derive(Error, Debug)]
pub enum MemoryError {
    /// The pattern analyzer (an LLM port) failed
    #[error("pattern analysis failed: {0}")]
    Analysis(String),

    /// A pattern entry violated its invariants
    #[error("invalid pattern entry: {0}")]
    InvalidPattern(String),
}
