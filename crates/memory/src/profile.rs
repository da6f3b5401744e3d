use crate::analyzer::PatternAnalyzer;
use crate::error::Result;
use crate::outline::CodebaseOutline;
use crate::patterns::{merge_patterns, PatternEntry};
use argus_core::CommitSha;
use serde::{Deserialize, Serialize};

/// Persistent memory for a repository.
///
/// `analyzed_at` advances only when a full analysis call returns
/// successfully; the field stays behind `indexed_at` across index-only
/// runs by design.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodebaseMemory {
    pub analyzed_at: Option<CommitSha>,
    pub outline: CodebaseOutline,
    pub patterns: Vec<PatternEntry>,
}

impl CodebaseMemory {
    /// Analysis state relative to the current HEAD. Computed on load;
    /// never mutates storage.
    pub fn status(&self, head: &CommitSha) -> MemoryStatus {
        match &self.analyzed_at {
            None => MemoryStatus::Absent,
            Some(at) if at == head => MemoryStatus::Ready,
            Some(at) => MemoryStatus::Stale {
                analyzed_at: at.clone(),
                head: head.clone(),
            },
        }
    }
}

/// Memory analysis state machine: `Absent → Analyzing → Ready → Stale`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryStatus {
    Absent,
    Analyzing,
    Ready,
    Stale { analyzed_at: CommitSha, head: CommitSha },
}

/// Orchestrates pattern analysis and profile maintenance.
pub struct ProfileService {
    analyzer: std::sync::Arc<dyn PatternAnalyzer>,
}

impl ProfileService {
    pub fn new(analyzer: std::sync::Arc<dyn PatternAnalyzer>) -> Self {
        ProfileService { analyzer }
    }

    /// Bootstrap analysis against the full outline.
    ///
    /// Existing patterns (if any survived from earlier runs) participate in
    /// the merge so confidence never regresses. The stored outline becomes
    /// the freshly rendered full outline and `analyzed_at` moves to HEAD.
    pub async fn bootstrap(
        &self,
        existing: Option<CodebaseMemory>,
        full_outline: CodebaseOutline,
        outline_text: &str,
        diff_text: &str,
        head: CommitSha,
    ) -> Result<CodebaseMemory> {
        let candidates = self.analyzer.analyze(outline_text, diff_text).await?;
        let prior_patterns = existing.map(|m| m.patterns).unwrap_or_default();
        let patterns = merge_patterns(prior_patterns, candidates);

        Ok(CodebaseMemory {
            analyzed_at: Some(head),
            outline: full_outline,
            patterns,
        })
    }

    /// Incremental analysis on the index path.
    ///
    /// The scoped outline is used only for the LLM call; the stored outline
    /// remains the previously persisted full outline. `analyzed_at`
    /// advances to the target SHA only because the analyze call succeeded —
    /// a failed call propagates and leaves the watermark untouched.
    pub async fn incremental(
        &self,
        existing: CodebaseMemory,
        scoped_outline_text: &str,
        diff_text: &str,
        target: CommitSha,
    ) -> Result<CodebaseMemory> {
        let candidates = self.analyzer.analyze(scoped_outline_text, diff_text).await?;
        let patterns = merge_patterns(existing.patterns, candidates);

        Ok(CodebaseMemory {
            analyzed_at: Some(target),
            outline: existing.outline,
            patterns,
        })
    }
}
