use crate::error::Result;
use crate::patterns::PatternEntry;
use async_trait::async_trait;

/// Port for LLM-driven pattern analysis.
///
/// The analyzer receives the rendered outline (full on bootstrap, scoped to
/// the change on incremental runs) plus the diff, and returns candidate
/// pattern entries. Confidence values are sanitized by the profile service;
/// implementations need not clamp.
#[async_trait]
pub trait PatternAnalyzer: Send + Sync {
    async fn analyze(&self, outline_text: &str, diff_text: &str) -> Result<Vec<PatternEntry>>;
}
