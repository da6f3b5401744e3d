use crate::error::Result;
use argus_core::{estimate_tokens, FilePath, LineRange, ReviewDepth, TokenBudget, TokenCount};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// The closed set of retrieval strategies, in their fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Structural,
    Lexical,
    Semantic,
    Agentic,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Structural => "structural",
            StrategyKind::Lexical => "lexical",
            StrategyKind::Semantic => "semantic",
            StrategyKind::Agentic => "agentic",
        };
        f.write_str(s)
    }
}

/// What context a review run needs.
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    pub changed_files: Vec<FilePath>,
    /// Qualified names (`path:symbol`) of symbols touched by the diff.
    pub changed_symbols: Vec<String>,
    pub diff_text: String,
    pub depth: ReviewDepth,
    pub budget: TokenBudget,
}

/// A single piece of retrieved context.
///
/// `fingerprint` is a stable hash of `(file_path, line_range)` — the
/// dedup key across strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextItem {
    pub source_strategy: StrategyKind,
    pub file_path: FilePath,
    pub line_range: LineRange,
    pub text: String,
    pub score: f64,
    pub fingerprint: u64,
}

impl ContextItem {
    pub fn new(
        source_strategy: StrategyKind,
        file_path: FilePath,
        line_range: LineRange,
        text: String,
        score: f64,
    ) -> Self {
        let fingerprint = fingerprint(&file_path, &line_range);
        ContextItem {
            source_strategy,
            file_path,
            line_range,
            text,
            score,
            fingerprint,
        }
    }

    pub fn token_cost(&self) -> TokenCount {
        estimate_tokens(&self.text)
    }
}

/// Stable across runs: derived from content, not from pointer identity.
pub(crate) fn fingerprint(path: &FilePath, range: &LineRange) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(path.as_str().as_bytes());
    hasher.update(range.start.to_be_bytes());
    hasher.update(range.end.to_be_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ])
}

/// Ranked, budgeted context ready for prompt assembly.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub items: Vec<ContextItem>,
    pub tokens_used: TokenCount,
    pub dropped_count: usize,
}

/// Contract implemented by every retrieval strategy.
///
/// Scores are in `[0, 1]` and reflect the strategy's own confidence only —
/// cross-strategy comparability is the ranker's job.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<ContextItem>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_matches_for_identical_identity() {
        let a = ContextItem::new(
            StrategyKind::Lexical,
            FilePath::new("a/x.py"),
            LineRange { start: 1, end: 9 },
            "text one".into(),
            0.6,
        );
        let b = ContextItem::new(
            StrategyKind::Semantic,
            FilePath::new("a/x.py"),
            LineRange { start: 1, end: 9 },
            "different text".into(),
            0.4,
        );
        assert_eq!(a.fingerprint, b.fingerprint);

        let c = ContextItem::new(
            StrategyKind::Lexical,
            FilePath::new("a/x.py"),
            LineRange { start: 2, end: 9 },
            "text".into(),
            0.6,
        );
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn token_cost_uses_the_shared_estimator() {
        let item = ContextItem::new(
            StrategyKind::Structural,
            FilePath::new("a.py"),
            LineRange { start: 1, end: 1 },
            "abcdefgh".into(),
            1.0,
        );
        assert_eq!(item.token_cost(), TokenCount(2));
    }
}
