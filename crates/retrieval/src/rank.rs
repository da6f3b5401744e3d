use crate::query::{ContextItem, RetrievalResult, StrategyKind};
use argus_core::{TokenBudget, TokenCount};
use std::collections::{BTreeMap, BTreeSet};

/// Consensus bonus per additional strategy that surfaced the same item.
const CONSENSUS_BONUS: f64 = 0.05;

/// Share of the retrieval budget reserved for structural items, so
/// structural evidence is never starved by lexical or semantic noise.
const STRUCTURAL_RESERVE: f64 = 0.4;

/// Deduplicates, scores, and budget-constrains items from all strategies.
///
/// Deterministic: given identical strategy outputs the result is identical,
/// regardless of the order strategies completed in — inputs arrive in the
/// fixed strategy order and every sort has a total tie-break.
#[derive(Debug, Clone, Default)]
pub struct Ranker;

impl Ranker {
    pub fn new() -> Self {
        Ranker
    }

    /// `strategy_outputs` must be in the fixed execution order
    /// (structural, lexical, semantic, agentic); empty vectors are fine.
    pub fn rank(
        &self,
        strategy_outputs: Vec<Vec<ContextItem>>,
        budget: &TokenBudget,
    ) -> RetrievalResult {
        // Dedupe by fingerprint: keep the best-scored item, remember every
        // strategy that surfaced it.
        let mut merged: BTreeMap<u64, (ContextItem, BTreeSet<StrategyKind>)> = BTreeMap::new();
        for item in strategy_outputs.into_iter().flatten() {
            match merged.get_mut(&item.fingerprint) {
                Some((best, kinds)) => {
                    kinds.insert(item.source_strategy);
                    if item.score > best.score {
                        *best = item;
                    }
                }
                None => {
                    let kinds = BTreeSet::from([item.source_strategy]);
                    merged.insert(item.fingerprint, (item, kinds));
                }
            }
        }

        // Consensus bonus, then a total order.
        let mut ranked: Vec<(ContextItem, f64)> = merged
            .into_values()
            .map(|(item, kinds)| {
                let bonus = CONSENSUS_BONUS * (kinds.len().saturating_sub(1)) as f64;
                let final_score = (item.score + bonus).min(1.0);
                if kinds.len() > 1 {
                    log::debug!(
                        "consensus on {}:{} from {:?}",
                        item.file_path,
                        item.line_range,
                        kinds,
                    );
                }
                (item, final_score)
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.file_path.cmp(&b.0.file_path))
                .then_with(|| a.0.line_range.cmp(&b.0.line_range))
        });

        // Admission: structural items first within their reserved share,
        // then everything else greedily until the retrieval budget.
        let retrieval_cap = budget.retrieval;
        let reserve = TokenCount((retrieval_cap.get() as f64 * STRUCTURAL_RESERVE) as u32);

        let mut admitted = vec![false; ranked.len()];
        let mut used = TokenCount::ZERO;

        for (idx, (item, _)) in ranked.iter().enumerate() {
            if item.source_strategy != StrategyKind::Structural {
                continue;
            }
            let cost = item.token_cost();
            if used.saturating_add(cost) <= reserve {
                admitted[idx] = true;
                used = used.saturating_add(cost);
            }
        }

        for (idx, (item, _)) in ranked.iter().enumerate() {
            if admitted[idx] {
                continue;
            }
            let cost = item.token_cost();
            if used.saturating_add(cost) <= retrieval_cap {
                admitted[idx] = true;
                used = used.saturating_add(cost);
            }
        }

        let dropped_count = admitted.iter().filter(|a| !**a).count();
        let items: Vec<ContextItem> = ranked
            .into_iter()
            .zip(admitted)
            .filter(|(_, keep)| *keep)
            .map(|((mut item, final_score), _)| {
                item.score = final_score;
                item
            })
            .collect();

        RetrievalResult {
            items,
            tokens_used: used,
            dropped_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{FilePath, LineRange};

    fn item(strategy: StrategyKind, path: &str, start: u32, score: f64, text: &str) -> ContextItem {
        ContextItem::new(
            strategy,
            FilePath::new(path),
            LineRange { start, end: start + 4 },
            text.to_string(),
            score,
        )
    }

    fn budget(total: u32) -> TokenBudget {
        TokenBudget::from_total(TokenCount(total))
    }

    #[test]
    fn consensus_bonus_applies_per_extra_strategy() {
        let result = Ranker::new().rank(
            vec![
                vec![item(StrategyKind::Structural, "a.py", 1, 0.6, "text")],
                vec![item(StrategyKind::Lexical, "a.py", 1, 0.4, "text")],
                vec![],
                vec![],
            ],
            &budget(100_000),
        );
        assert_eq!(result.items.len(), 1);
        assert!((result.items[0].score - 0.65).abs() < 1e-9);

        let solo = Ranker::new().rank(
            vec![vec![item(StrategyKind::Structural, "a.py", 1, 0.6, "text")]],
            &budget(100_000),
        );
        assert!((solo.items[0].score - 0.60).abs() < 1e-9);
    }

    #[test]
    fn bonus_caps_at_one() {
        let result = Ranker::new().rank(
            vec![
                vec![item(StrategyKind::Structural, "a.py", 1, 0.99, "t")],
                vec![item(StrategyKind::Lexical, "a.py", 1, 0.9, "t")],
                vec![item(StrategyKind::Semantic, "a.py", 1, 0.9, "t")],
            ],
            &budget(100_000),
        );
        assert_eq!(result.items[0].score, 1.0);
    }

    #[test]
    fn budget_conformance() {
        // retrieval budget: 40% of 100 tokens = 40 tokens. Each item costs
        // ceil(60/4) = 15 tokens, so only two fit.
        let text = "x".repeat(60);
        let result = Ranker::new().rank(
            vec![vec![
                item(StrategyKind::Lexical, "a.py", 1, 0.9, &text),
                item(StrategyKind::Lexical, "b.py", 1, 0.8, &text),
                item(StrategyKind::Lexical, "c.py", 1, 0.7, &text),
            ]],
            &budget(100),
        );
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.dropped_count, 1);
        assert!(result.tokens_used <= TokenCount(40));
    }

    #[test]
    fn structural_reserve_survives_lexical_flood() {
        // A low-scored structural item is admitted ahead of higher-scored
        // lexical items that would otherwise exhaust the budget.
        let flood: Vec<ContextItem> = (0..10)
            .map(|i| {
                item(
                    StrategyKind::Lexical,
                    &format!("noise{i}.py"),
                    1,
                    0.95,
                    &"y".repeat(80),
                )
            })
            .collect();
        let structural = vec![item(StrategyKind::Structural, "dep.py", 1, 0.3, &"z".repeat(40))];

        let result = Ranker::new().rank(vec![structural, flood], &budget(200));
        assert!(result
            .items
            .iter()
            .any(|i| i.source_strategy == StrategyKind::Structural));
    }

    #[test]
    fn determinism_is_independent_of_completion_order() {
        let a = vec![item(StrategyKind::Structural, "a.py", 1, 0.9, "alpha")];
        let b = vec![item(StrategyKind::Lexical, "b.py", 1, 0.8, "beta")];

        // The ranker always receives outputs in fixed strategy order; the
        // same inputs give byte-identical results across calls.
        let first = Ranker::new().rank(vec![a.clone(), b.clone()], &budget(100_000));
        let second = Ranker::new().rank(vec![a, b], &budget(100_000));
        assert_eq!(first.items, second.items);
        assert_eq!(first.tokens_used, second.tokens_used);
    }

    #[test]
    fn equal_scores_break_ties_by_path_then_range() {
        let result = Ranker::new().rank(
            vec![vec![
                item(StrategyKind::Lexical, "b.py", 1, 0.5, "t"),
                item(StrategyKind::Lexical, "a.py", 9, 0.5, "t"),
                item(StrategyKind::Lexical, "a.py", 1, 0.5, "t"),
            ]],
            &budget(100_000),
        );
        let order: Vec<(&str, u32)> = result
            .items
            .iter()
            .map(|i| (i.file_path.as_str(), i.line_range.start))
            .collect();
        assert_eq!(order, vec![("a.py", 1), ("a.py", 9), ("b.py", 1)]);
    }
}
