use serde::{Deserialize, Serialize};

/// Entries below this confidence are pruned after every merge.
pub const MIN_PATTERN_CONFIDENCE: f64 = 0.3;

/// Hard cap on stored pattern entries.
pub const MAX_PATTERN_ENTRIES: usize = 30;

/// Categories of codebase patterns learned from analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Style,
    Naming,
    Architecture,
    Testing,
    ErrorHandling,
    Concurrency,
}

/// A single learned codebase pattern.
///
/// `examples` are `path:start-end` references into the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub category: PatternCategory,
    pub description: String,
    pub confidence: f64,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl PatternEntry {
    /// Clamp confidence into `[0, 1]`; analyzer output is untrusted.
    pub fn sanitized(mut self) -> Self {
        if !self.confidence.is_finite() {
            self.confidence = 0.0;
        }
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }

    fn merge_key(&self) -> (PatternCategory, &str) {
        (self.category, self.description.as_str())
    }
}

/// Drop low-confidence entries, cap the count, and sort by descending
/// confidence (description breaks ties so the order is total).
pub fn prune_and_cap(mut patterns: Vec<PatternEntry>) -> Vec<PatternEntry> {
    patterns.retain(|p| p.confidence >= MIN_PATTERN_CONFIDENCE);
    patterns.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.description.cmp(&b.description))
    });
    patterns.truncate(MAX_PATTERN_ENTRIES);
    patterns
}

/// Merge candidate entries into an existing set.
///
/// An identical `(category, description)` pair keeps the higher-confidence
/// entry; new entries are inserted if they survive pruning.
pub fn merge_patterns(
    existing: Vec<PatternEntry>,
    candidates: Vec<PatternEntry>,
) -> Vec<PatternEntry> {
    let mut merged = existing;
    for candidate in candidates {
        let candidate = candidate.sanitized();
        match merged
            .iter_mut()
            .find(|p| p.merge_key() == candidate.merge_key())
        {
            Some(current) => {
                if candidate.confidence > current.confidence {
                    *current = candidate;
                }
            }
            None => merged.push(candidate),
        }
    }
    prune_and_cap(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(desc: &str, confidence: f64) -> PatternEntry {
        PatternEntry {
            category: PatternCategory::Style,
            description: desc.to_string(),
            confidence,
            examples: vec![],
        }
    }

    #[test]
    fn pruning_drops_low_confidence() {
        let result = prune_and_cap(vec![entry("keep", 0.5), entry("drop", 0.29)]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].description, "keep");
    }

    #[test]
    fn cap_keeps_the_thirty_highest() {
        let patterns: Vec<PatternEntry> = (0..40)
            .map(|i| entry(&format!("p{i:02}"), 0.3 + (i as f64) / 100.0))
            .collect();
        let result = prune_and_cap(patterns);
        assert_eq!(result.len(), MAX_PATTERN_ENTRIES);
        // Sorted strictly descending.
        for pair in result.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        assert!((result[0].confidence - 0.69).abs() < 1e-9);
    }

    #[test]
    fn merge_keeps_higher_confidence_duplicate() {
        let merged = merge_patterns(vec![entry("dup", 0.5)], vec![entry("dup", 0.8)]);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].confidence - 0.8).abs() < 1e-9);

        let merged = merge_patterns(vec![entry("dup", 0.9)], vec![entry("dup", 0.4)]);
        assert!((merged[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn different_category_is_a_different_pattern() {
        let mut other = entry("same words", 0.6);
        other.category = PatternCategory::Testing;
        let merged = merge_patterns(vec![entry("same words", 0.5)], vec![other]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn sanitize_clamps_bogus_confidence() {
        assert_eq!(entry("x", 2.0).sanitized().confidence, 1.0);
        assert_eq!(entry("x", f64::NAN).sanitized().confidence, 0.0);
    }
}
