use thiserror::Error;

/// Result type for retrieval operations
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors inside the retrieval subsystem.
///
/// Strategy failures are contained by the orchestrator: a failed strategy
/// contributes zero items and the run continues.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding provider call failed
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// Agentic session model call failed
    #[error("agent model error: {0}")]
    Agent(String),

    /// A strategy exceeded its deadline
    #[error("{strategy} timed out after {seconds}s")]
    Timeout { strategy: &'static str, seconds: u64 },
}
