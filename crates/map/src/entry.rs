use argus_core::{CommitSha, FilePath, Symbol};
use serde::{Deserialize, Serialize};

/// A single source file's parsed representation.
///
/// `content_hash` is the SHA-256 of the bytes that were parsed;
/// `last_indexed_sha` is the commit at which this entry was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: FilePath,
    pub language: String,
    pub content_hash: String,
    pub last_indexed_sha: CommitSha,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl FileEntry {
    /// Entry for a file that failed to parse: structure intact, no symbols.
    pub fn degraded(
        path: FilePath,
        language: &str,
        content_hash: String,
        last_indexed_sha: CommitSha,
    ) -> Self {
        FileEntry {
            path,
            language: language.to_string(),
            content_hash,
            last_indexed_sha,
            symbols: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            summary: None,
        }
    }

    pub fn symbol_named(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }
}
