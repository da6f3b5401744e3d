use crate::error::Result;
use crate::query::{ContextItem, RetrievalQuery, RetrievalStrategy, StrategyKind};
use crate::tokenize::{extract_identifiers, split_identifiers};
use argus_core::FilePath;
use argus_parser::CodeChunk;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

const K1: f64 = 1.2;
const B: f64 = 0.75;
const DEFAULT_TOP_K: usize = 12;

/// BM25 sparse retrieval over code chunks.
///
/// The inverted index is built lazily on first use and discarded with the
/// run. Scores are normalized by the maximum in the result set, so the
/// ranker sees `[0, 1]` like every other strategy.
pub struct LexicalStrategy {
    chunks: Vec<CodeChunk>,
    index: OnceLock<Bm25Index>,
    top_k: usize,
}

impl LexicalStrategy {
    pub fn new(chunks: Vec<CodeChunk>) -> Self {
        LexicalStrategy {
            chunks,
            index: OnceLock::new(),
            top_k: DEFAULT_TOP_K,
        }
    }

    fn index(&self) -> &Bm25Index {
        self.index.get_or_init(|| Bm25Index::build(&self.chunks))
    }
}

#[async_trait]
impl RetrievalStrategy for LexicalStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Lexical
    }

    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<ContextItem>> {
        if self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut terms: Vec<String> = Vec::new();
        for symbol in &query.changed_symbols {
            terms.extend(split_identifiers(symbol));
        }
        for identifier in extract_identifiers(&query.diff_text) {
            terms.extend(split_identifiers(&identifier));
        }
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = self.index().score(&terms);
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let changed: BTreeSet<&FilePath> = query.changed_files.iter().collect();
        let max_score = scored.first().map(|(_, s)| *s).unwrap_or(0.0);
        if max_score <= 0.0 {
            return Ok(Vec::new());
        }

        let items = scored
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .filter_map(|(doc, score)| {
                let chunk = self.chunks.get(doc)?;
                if changed.contains(&chunk.file_path) {
                    return None;
                }
                Some(ContextItem::new(
                    StrategyKind::Lexical,
                    chunk.file_path.clone(),
                    chunk.line_range,
                    chunk.text.clone(),
                    score / max_score,
                ))
            })
            .take(self.top_k)
            .collect();

        Ok(items)
    }
}

/// Inverted index over identifier-split tokens.
struct Bm25Index {
    postings: HashMap<String, Vec<(usize, u32)>>,
    doc_lengths: Vec<u32>,
    avg_doc_length: f64,
}

impl Bm25Index {
    fn build(chunks: &[CodeChunk]) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(chunks.len());

        for (doc, chunk) in chunks.iter().enumerate() {
            let tokens = split_identifiers(&chunk.text);
            doc_lengths.push(tokens.len() as u32);

            let mut frequencies: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *frequencies.entry(token).or_insert(0) += 1;
            }
            for (token, tf) in frequencies {
                postings.entry(token).or_default().push((doc, tf));
            }
        }

        let total: u64 = doc_lengths.iter().map(|&l| l as u64).sum();
        let avg_doc_length = if doc_lengths.is_empty() {
            1.0
        } else {
            (total as f64 / doc_lengths.len() as f64).max(1.0)
        };

        Bm25Index {
            postings,
            doc_lengths,
            avg_doc_length,
        }
    }

    /// Raw BM25 scores per document for the query terms.
    fn score(&self, terms: &[String]) -> Vec<(usize, f64)> {
        let n = self.doc_lengths.len() as f64;
        let mut scores: HashMap<usize, f64> = HashMap::new();

        for term in terms {
            let Some(posting) = self.postings.get(term) else { continue };
            let df = posting.len() as f64;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for &(doc, tf) in posting {
                let tf = tf as f64;
                let len_norm = self.doc_lengths[doc] as f64 / self.avg_doc_length;
                let bm25 = idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * len_norm));
                *scores.entry(doc).or_insert(0.0) += bm25;
            }
        }

        scores.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{LineRange, ReviewDepth, TokenBudget, TokenCount};

    fn chunk(path: &str, start: u32, text: &str) -> CodeChunk {
        CodeChunk {
            file_path: FilePath::new(path),
            line_range: LineRange { start, end: start + 5 },
            text: text.to_string(),
            anchor_symbol: None,
        }
    }

    fn query(symbols: &[&str], diff: &str) -> RetrievalQuery {
        RetrievalQuery {
            changed_files: vec![FilePath::new("changed.py")],
            changed_symbols: symbols.iter().map(|s| s.to_string()).collect(),
            diff_text: diff.to_string(),
            depth: ReviewDepth::Standard,
            budget: TokenBudget::from_total(TokenCount(10_000)),
        }
    }

    #[tokio::test]
    async fn matching_chunks_rank_first_and_normalize_to_one() {
        let strategy = LexicalStrategy::new(vec![
            chunk("store/shard.py", 1, "def split_shards(manifest):\n    return manifest"),
            chunk("web/view.py", 1, "def render_page(request):\n    return html"),
            chunk("store/hash.py", 1, "def shard_hash(shard_id):\n    return sha256(shard_id)"),
        ]);

        let items = strategy
            .retrieve(&query(&["split_shards"], "+    split_shards(manifest)\n"))
            .await
            .unwrap();

        assert!(!items.is_empty());
        assert_eq!(items[0].file_path.as_str(), "store/shard.py");
        assert!((items[0].score - 1.0).abs() < 1e-9);
        for item in &items {
            assert!(item.score > 0.0 && item.score <= 1.0);
        }
    }

    #[tokio::test]
    async fn chunks_from_changed_files_are_skipped() {
        let strategy = LexicalStrategy::new(vec![
            chunk("changed.py", 1, "def target_fn():\n    pass"),
            chunk("other.py", 1, "def target_fn_caller():\n    target_fn()"),
        ]);
        let items = strategy
            .retrieve(&query(&["target_fn"], ""))
            .await
            .unwrap();
        assert!(items.iter().all(|i| i.file_path.as_str() != "changed.py"));
    }

    #[tokio::test]
    async fn empty_query_or_corpus_yields_nothing() {
        let strategy = LexicalStrategy::new(vec![]);
        assert!(strategy.retrieve(&query(&["x"], "")).await.unwrap().is_empty());

        let strategy = LexicalStrategy::new(vec![chunk("a.py", 1, "code here")]);
        assert!(strategy.retrieve(&query(&[], "")).await.unwrap().is_empty());
    }

    #[test]
    fn camel_case_queries_reach_snake_case_code() {
        let index = Bm25Index::build(&[chunk("a.py", 1, "def load_selected(paths): pass")]);
        let terms = split_identifiers("loadSelected");
        let scores = index.score(&terms);
        assert!(!scores.is_empty());
        assert!(scores[0].1 > 0.0);
    }
}
