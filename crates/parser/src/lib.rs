//! # Argus Parser
//!
//! Turns source bytes into structured symbol records via tree-sitter.
//!
//! The parser is the leaf of the indexing pipeline: it knows nothing about
//! commits, shards, or graphs. It produces a [`ParsedSource`] per file —
//! symbols, imports, exports, and local reference edges whose targets are
//! left for the indexing service to resolve at graph-link time.

mod chunker;
mod error;
mod language;
mod parser;

pub use chunker::{chunk_source, CodeChunk};
pub use error::{ParserError, Result};
pub use language::{Language, LanguageTable};
pub use parser::{ParsedSource, SourceParser};
