use thiserror::Error;

/// Result type for indexing operations
pub type Result<T> = std::result::Result<T, IndexingError>;

/// Errors that abort a map build.
///
/// Per-file parse failures never appear here — they degrade the single
/// file to an empty entry and the build continues.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Repository root missing or unreadable
    #[error("repository root not found: {0}")]
    MissingRoot(String),

    /// Structural failure: the stage and target that failed, with cause
    #[error("indexing failed during {stage} at {path}: {cause}")]
    Structural {
        stage: &'static str,
        path: String,
        cause: String,
    },
}
