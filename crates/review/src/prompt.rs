use crate::error::{Result, ReviewError};
use argus_core::{estimate_tokens, TokenBudget, TokenCount};
use argus_memory::PatternEntry;
use argus_retrieval::RetrievalResult;

/// Raw section texts, before budgeting. Only the diff is mandatory.
#[derive(Debug, Clone, Default)]
pub struct PromptSections {
    pub diff: String,
    pub pr_context: Option<String>,
    pub retrieved: Option<String>,
    pub outline: Option<String>,
    pub patterns: Option<String>,
}

/// The assembled prompt plus what had to be dropped to fit.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub text: String,
    pub tokens: TokenCount,
    pub dropped_sections: Vec<&'static str>,
}

/// Assemble sections in priority order: diff > PR context > retrieved >
/// outline > patterns. A section that would overflow is dropped wholly and
/// logged; the diff is never truncated — if it alone exceeds the budget
/// the run aborts.
pub fn assemble_prompt(sections: PromptSections, budget: &TokenBudget) -> Result<AssembledPrompt> {
    let diff_block = format!("## Diff\n```diff\n{}\n```\n", sections.diff);
    let diff_tokens = estimate_tokens(&diff_block);
    if diff_tokens > budget.total {
        return Err(ReviewError::PromptTooLarge {
            required: diff_tokens,
            budget: budget.total,
        });
    }

    let mut text = diff_block;
    let mut used = diff_tokens;
    let mut dropped: Vec<&'static str> = Vec::new();

    let optional: [(&'static str, Option<String>); 4] = [
        ("pr_context", sections.pr_context.map(|s| format!("## Pull request\n{s}\n"))),
        ("retrieved", sections.retrieved.map(|s| format!("## Related code\n{s}\n"))),
        ("outline", sections.outline.map(|s| format!("## Codebase outline\n{s}\n"))),
        ("patterns", sections.patterns.map(|s| format!("## Codebase patterns\n{s}\n"))),
    ];

    for (name, block) in optional {
        let Some(block) = block else { continue };
        let cost = estimate_tokens(&block);
        if used.saturating_add(cost) > budget.total {
            log::info!("dropping prompt section {name}: {cost} tokens over budget");
            dropped.push(name);
            continue;
        }
        text.push_str(&block);
        used = used.saturating_add(cost);
    }

    Ok(AssembledPrompt {
        text,
        tokens: used,
        dropped_sections: dropped,
    })
}

/// Render ranked context items for the prompt.
pub fn render_retrieved(result: &RetrievalResult) -> Option<String> {
    if result.items.is_empty() {
        return None;
    }
    let mut out = String::new();
    for item in &result.items {
        out.push_str(&format!(
            "### {} (lines {}, {})\n{}\n\n",
            item.file_path, item.line_range, item.source_strategy, item.text,
        ));
    }
    Some(out)
}

/// Render learned patterns, highest confidence first (they arrive sorted).
pub fn render_patterns(patterns: &[PatternEntry]) -> Option<String> {
    if patterns.is_empty() {
        return None;
    }
    let lines: Vec<String> = patterns
        .iter()
        .map(|p| {
            format!(
                "- [{:?}] {} (confidence {:.2})",
                p.category, p.description, p.confidence
            )
        })
        .collect();
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(total: u32) -> TokenBudget {
        TokenBudget::from_total(TokenCount(total))
    }

    #[test]
    fn diff_is_mandatory_and_first() {
        let prompt = assemble_prompt(
            PromptSections {
                diff: "+change".into(),
                outline: Some("a.py: f(f)".into()),
                ..Default::default()
            },
            &budget(10_000),
        )
        .unwrap();
        assert!(prompt.text.starts_with("## Diff"));
        assert!(prompt.text.contains("## Codebase outline"));
        assert!(prompt.dropped_sections.is_empty());
    }

    #[test]
    fn oversized_diff_aborts() {
        let err = assemble_prompt(
            PromptSections {
                diff: "x".repeat(10_000),
                ..Default::default()
            },
            &budget(100),
        );
        assert!(matches!(err, Err(ReviewError::PromptTooLarge { .. })));
    }

    #[test]
    fn overflowing_sections_are_dropped_wholly() {
        // Budget fits the diff and the PR context but not the outline.
        let prompt = assemble_prompt(
            PromptSections {
                diff: "+x".into(),
                pr_context: Some("small".into()),
                retrieved: None,
                outline: Some("o".repeat(4_000)),
                patterns: Some("tiny".into()),
            },
            &budget(100),
        )
        .unwrap();

        assert!(prompt.text.contains("## Pull request"));
        assert!(!prompt.text.contains("## Codebase outline"));
        // Lower-priority patterns still fit after the outline was dropped.
        assert!(prompt.text.contains("## Codebase patterns"));
        assert_eq!(prompt.dropped_sections, vec!["outline"]);
        assert!(prompt.tokens <= TokenCount(100));
    }
}
