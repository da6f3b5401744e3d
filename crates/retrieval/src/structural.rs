use crate::error::Result;
use crate::query::{ContextItem, RetrievalQuery, RetrievalStrategy, StrategyKind};
use argus_core::{FilePath, LineRange};
use argus_map::{AdjacencyIndex, CodebaseMap};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

const DIRECT_EDGE_SCORE: f64 = 1.0;
const SAME_FILE_SCORE: f64 = 0.7;

/// Graph-walk retrieval: direct dependents and dependencies of the changed
/// symbols at depth 1, plus all symbols sharing a file with them.
///
/// Deterministic, never suspends, never calls out. Works on partial maps:
/// an edge endpoint with no loaded entry simply contributes nothing.
pub struct StructuralStrategy {
    map: Arc<CodebaseMap>,
    adjacency: AdjacencyIndex,
}

impl StructuralStrategy {
    pub fn new(map: Arc<CodebaseMap>) -> Self {
        let adjacency = map.graph.adjacency();
        StructuralStrategy { map, adjacency }
    }

    fn item_for_node(&self, node: &str, score: f64) -> Option<ContextItem> {
        let (path_str, symbol_name) = match node.split_once(':') {
            Some((p, s)) => (p, Some(s)),
            None => (node, None),
        };
        let path = FilePath::new(path_str);
        let entry = self.map.get(&path)?;

        match symbol_name {
            Some(name) => {
                let symbol = entry.symbol_named(name)?;
                let text = format!(
                    "{}: {} {} (lines {})",
                    path,
                    symbol.kind.as_str(),
                    symbol.name,
                    symbol.line_range,
                );
                Some(ContextItem::new(
                    StrategyKind::Structural,
                    path,
                    symbol.line_range,
                    text,
                    score,
                ))
            }
            None => {
                let text = if entry.exports.is_empty() {
                    format!("# {path}")
                } else {
                    format!("# {path}\nExports: {}", entry.exports.join(", "))
                };
                Some(ContextItem::new(
                    StrategyKind::Structural,
                    path,
                    LineRange { start: 1, end: 1 },
                    text,
                    score,
                ))
            }
        }
    }
}

#[async_trait]
impl RetrievalStrategy for StructuralStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<ContextItem>> {
        let changed_files: Vec<&FilePath> = query.changed_files.iter().collect();
        let mut scores: HashMap<String, f64> = HashMap::new();

        let mut bump = |node: &str, score: f64| {
            let current = scores.entry(node.to_string()).or_insert(0.0);
            if score > *current {
                *current = score;
            }
        };

        for symbol in &query.changed_symbols {
            for dependent in self.adjacency.dependents(symbol) {
                bump(dependent, DIRECT_EDGE_SCORE);
            }
            for dependency in self.adjacency.dependencies(symbol) {
                bump(dependency, DIRECT_EDGE_SCORE);
            }

            // Every symbol in the same file as the changed one.
            if let Some((path_str, _)) = symbol.split_once(':') {
                let path = FilePath::new(path_str);
                if let Some(entry) = self.map.get(&path) {
                    for sibling in &entry.symbols {
                        if &sibling.qualified_name != symbol {
                            bump(&sibling.qualified_name, SAME_FILE_SCORE);
                        }
                    }
                }
            }
        }

        // Changed files themselves are already in the prompt as the diff.
        let mut items: Vec<ContextItem> = scores
            .into_iter()
            .filter_map(|(node, score)| self.item_for_node(&node, score))
            .filter(|item| !changed_files.contains(&&item.file_path))
            .collect();

        items.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.line_range.cmp(&b.line_range))
        });
        Ok(items)
    }
}
