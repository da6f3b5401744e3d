use crate::artifact::ArtifactStore;
use crate::canonical::{sha256_hex_short, to_canonical_json};
use crate::error::{Result, StoreError};
use argus_core::ShardId;
use serde::{Deserialize, Serialize};

/// Precomputed embedding vectors for one shard's chunks.
///
/// `chunk_ids` and `vectors` are parallel arrays; the id format matches
/// `CodeChunk::chunk_id` so semantic retrieval can join back to chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    pub shard_id: ShardId,
    pub model: String,
    pub dimension: usize,
    pub chunk_ids: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
}

/// Blob name for a shard's embedding index under a given model.
pub fn embedding_blob_name(shard_id: &ShardId, model: &str) -> String {
    let key = format!("{}:{model}", shard_id.as_str());
    format!("{}_embeddings.json", sha256_hex_short(&key))
}

impl ArtifactStore {
    pub async fn save_embedding_index(&self, index: &EmbeddingIndex) -> Result<String> {
        let name = embedding_blob_name(&index.shard_id, &index.model);
        let json = to_canonical_json(index)?;
        self.write_blob(&name, json.as_bytes()).await?;
        Ok(name)
    }

    /// Load embedding indices for the given shards; shards with no stored
    /// vectors are skipped, corrupt blobs fail structurally.
    pub async fn load_embedding_indices(
        &self,
        shard_ids: impl IntoIterator<Item = &ShardId>,
        model: &str,
    ) -> Result<Vec<EmbeddingIndex>> {
        let mut indices = Vec::new();
        for sid in shard_ids {
            let name = embedding_blob_name(sid, model);
            let Some(bytes) = self.read_blob(&name).await? else {
                continue;
            };
            let index: EmbeddingIndex =
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Structural {
                    what: name.clone(),
                    cause: e.to_string(),
                })?;
            indices.push(index);
        }
        Ok(indices)
    }
}
