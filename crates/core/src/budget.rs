use serde::{Deserialize, Serialize};
use std::fmt;

/// A count of LLM tokens. Non-negative; arithmetic saturates.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenCount(pub u32);

impl TokenCount {
    pub const ZERO: TokenCount = TokenCount(0);

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn saturating_add(self, other: TokenCount) -> TokenCount {
        TokenCount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: TokenCount) -> TokenCount {
        TokenCount(self.0.saturating_sub(other.0))
    }

    /// Addition capped at a budget ceiling.
    pub fn add_capped(self, other: TokenCount, cap: TokenCount) -> TokenCount {
        self.saturating_add(other).min(cap)
    }
}

impl fmt::Display for TokenCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Estimate the token cost of a text: `ceil(chars / 4)`.
///
/// Used wherever no real encoder is available; every budget decision in the
/// engine goes through this single definition.
pub fn estimate_tokens(text: &str) -> TokenCount {
    let chars = text.chars().count() as u32;
    TokenCount(chars.div_ceil(4))
}

/// Token budget for a single run, split across prompt sections.
///
/// `total` is the whole prompt budget from configuration; the section
/// budgets are carved out of it. The diff has no budget of its own because
/// it is never truncated; it consumes from `total` before anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub total: TokenCount,
    pub retrieval: TokenCount,
    pub outline: TokenCount,
    pub patterns: TokenCount,
    pub pr_context: TokenCount,
}

impl TokenBudget {
    /// Default split: 40% retrieval, 15% outline, 5% patterns, 10% PR
    /// context; the remainder is headroom for the diff and instructions.
    pub fn from_total(total: TokenCount) -> Self {
        let t = total.0;
        TokenBudget {
            total,
            retrieval: TokenCount(t / 10 * 4),
            outline: TokenCount(t / 100 * 15),
            patterns: TokenCount(t / 100 * 5),
            pr_context: TokenCount(t / 10),
        }
    }
}
