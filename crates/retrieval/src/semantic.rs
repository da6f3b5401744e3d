use crate::error::{Result, RetrievalError};
use crate::query::{ContextItem, RetrievalQuery, RetrievalStrategy, StrategyKind};
use argus_core::FilePath;
use argus_parser::CodeChunk;
use argus_store::EmbeddingIndex;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Similarity floor below which matches are discarded as noise.
pub const MIN_SIMILARITY: f64 = 0.2;

const DEFAULT_TOP_K: usize = 10;
const DIFF_QUERY_CHARS: usize = 500;

/// Port for the embedding provider. One query embedding per run.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model(&self) -> &str;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Cosine-similarity retrieval over precomputed per-shard vectors.
///
/// Gated on `embedding_model` being configured. A provider failure yields
/// zero items and the run continues — semantic evidence is never load-bearing.
pub struct SemanticStrategy {
    provider: Arc<dyn EmbeddingProvider>,
    indices: Vec<EmbeddingIndex>,
    chunks_by_id: HashMap<String, CodeChunk>,
    top_k: usize,
}

impl SemanticStrategy {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        indices: Vec<EmbeddingIndex>,
        chunks: Vec<CodeChunk>,
    ) -> Self {
        let chunks_by_id = chunks.into_iter().map(|c| (c.chunk_id(), c)).collect();
        SemanticStrategy {
            provider,
            indices,
            chunks_by_id,
            top_k: DEFAULT_TOP_K,
        }
    }

    fn query_text(query: &RetrievalQuery) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !query.changed_symbols.is_empty() {
            parts.push(query.changed_symbols.join(" "));
        }
        if !query.diff_text.is_empty() {
            let truncated: String = query.diff_text.chars().take(DIFF_QUERY_CHARS).collect();
            parts.push(truncated);
        }
        parts.join(" ")
    }
}

#[async_trait]
impl RetrievalStrategy for SemanticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semantic
    }

    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<ContextItem>> {
        if self.indices.is_empty() {
            return Ok(Vec::new());
        }
        let text = Self::query_text(query);
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = match self.provider.embed(&[text]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => return Ok(Vec::new()),
            Err(e) => {
                log::warn!("embedding provider failed, semantic yields nothing: {e}");
                return Ok(Vec::new());
            }
        };

        let mut scored: Vec<(f64, &str)> = Vec::new();
        for index in &self.indices {
            for (chunk_id, vector) in index.chunk_ids.iter().zip(&index.vectors) {
                let similarity = cosine_similarity(&query_vector, vector);
                if similarity >= MIN_SIMILARITY {
                    scored.push((similarity, chunk_id));
                }
            }
        }

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });

        let changed: BTreeSet<&FilePath> = query.changed_files.iter().collect();
        let items = scored
            .into_iter()
            .filter_map(|(similarity, chunk_id)| {
                let chunk = self.chunks_by_id.get(chunk_id)?;
                if changed.contains(&chunk.file_path) {
                    return None;
                }
                Some(ContextItem::new(
                    StrategyKind::Semantic,
                    chunk.file_path.clone(),
                    chunk.line_range,
                    chunk.text.clone(),
                    similarity.clamp(0.0, 1.0),
                ))
            })
            .take(self.top_k)
            .collect();

        Ok(items)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
