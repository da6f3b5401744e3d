use argus_core::TokenCount;
use thiserror::Error;

/// Result type for review operations
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Errors across prompt assembly and the mode pipelines.
#[derive(Error, Debug)]
pub enum ReviewError {
    /// The diff alone exceeds the prompt budget. Never truncated silently.
    #[error("prompt too large: diff needs {required} tokens of a {budget} budget")]
    PromptTooLarge {
        required: TokenCount,
        budget: TokenCount,
    },

    /// The generator returned nothing parseable
    #[error("review generation failed: {0}")]
    Generation(String),

    /// Publishing the review failed
    #[error("publish failed: {0}")]
    Publish(String),

    /// Local git probe (changed paths, HEAD) failed
    #[error("git probe failed: {0}")]
    GitProbe(String),

    #[error(transparent)]
    Store(#[from] argus_store::StoreError),

    #[error(transparent)]
    Indexing(#[from] argus_map::IndexingError),

    #[error(transparent)]
    Memory(#[from] argus_memory::MemoryError),
}
