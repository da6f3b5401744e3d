use thiserror::Error;

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParserError>;

/// Errors that can occur while parsing a source file
#[derive(Error, Debug)]
pub enum ParserError {
    /// File extension is not in the language table
    #[error("unsupported language for {path}")]
    UnsupportedLanguage { path: String },

    /// Grammar failed to load for a supported language
    #[error("grammar error for {language}: {reason}")]
    Grammar { language: &'static str, reason: String },

    /// Tree-sitter could not produce a tree
    #[error("parse failed for {path}: {reason}")]
    Parse { path: String, reason: String },
}
