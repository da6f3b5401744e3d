use thiserror::Error;

/// Failures the action handles deliberately (exit code 1), as opposed to
/// bugs and unexpected conditions (exit code 2).
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid event payload: {0}")]
    Event(String),

    #[error("run exceeded the wall-clock ceiling")]
    Deadline,
}
