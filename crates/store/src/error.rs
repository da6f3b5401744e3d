use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors across the persistence and sync layer.
///
/// The taxonomy matters: transient errors are retried with backoff,
/// structural errors fail the run without any repair attempt, and a
/// concurrent-write error triggers exactly one re-pull and retry.
#[derive(Error, Debug)]
pub enum StoreError {
    /// HTTP 5xx/429, network timeout, rate limit. Retried with backoff.
    #[error("transient failure during {stage} for {target}: {cause}")]
    Transient {
        stage: &'static str,
        target: String,
        cause: String,
    },

    /// Non-transient HTTP failure (auth, not-found where required, 4xx).
    #[error("http {status} during {stage} for {target}")]
    Http {
        status: u16,
        stage: &'static str,
        target: String,
    },

    /// Malformed manifest, corrupt shard JSON, unknown schema. Never repaired.
    #[error("structural error in {what}: {cause}")]
    Structural { what: String, cause: String },

    /// Ref CAS mismatch that survived the single retry.
    #[error("concurrent write on {reference}: expected {expected}")]
    ConcurrentWrite { reference: String, expected: String },

    /// A blob named by the manifest is missing from the tree.
    #[error("missing blob {0}")]
    MissingBlob(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }

    pub fn is_concurrent_write(&self) -> bool {
        matches!(self, StoreError::ConcurrentWrite { .. })
    }
}
