use crate::canonical::{sha256_hex_short, to_canonical_json};
use crate::error::{Result, StoreError};
use crate::shard::{
    assemble_from_shards, selected_shards, split_into_shards, Manifest, MANIFEST_BLOB_NAME,
};
use argus_core::{FilePath, ShardId};
use argus_map::CodebaseMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Local artifact cache under `storage_dir`.
///
/// Mirrors the branch layout on disk so the sync layer can move bytes
/// without re-serializing, and older installations with a single flat map
/// blob keep working until the next save replaces it.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    storage_dir: PathBuf,
    repo_id: String,
}

impl ArtifactStore {
    pub fn new(storage_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        ArtifactStore {
            storage_dir: storage_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Name of the pre-sharding flat blob for this repository.
    pub fn legacy_blob_name(&self) -> String {
        format!("{}.json", sha256_hex_short(&self.repo_id))
    }

    pub async fn read_blob(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.storage_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(tokio::fs::read(&path).await?))
    }

    /// Atomic write: temp file then rename, so a crashed run never leaves
    /// a half-written artifact behind.
    pub async fn write_blob(&self, name: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        let path = self.storage_dir.join(name);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub async fn delete_blob(&self, name: &str) -> Result<()> {
        let path = self.storage_dir.join(name);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    pub async fn load_manifest(&self) -> Result<Option<Manifest>> {
        let Some(bytes) = self.read_blob(MANIFEST_BLOB_NAME).await? else {
            return Ok(None);
        };
        let manifest = serde_json::from_slice(&bytes).map_err(|e| StoreError::Structural {
            what: MANIFEST_BLOB_NAME.to_string(),
            cause: e.to_string(),
        })?;
        Ok(Some(manifest))
    }

    /// Load a partial map for the given paths, one cross-edge hop included.
    pub async fn load_selected(&self, required_paths: &[FilePath]) -> Result<Option<CodebaseMap>> {
        let Some(manifest) = self.load_manifest().await? else {
            return self.load_legacy().await;
        };

        let shard_ids = selected_shards(&manifest, required_paths);
        let mut jsons: BTreeMap<ShardId, String> = BTreeMap::new();
        for sid in shard_ids {
            let Some(desc) = manifest.shards.get(&sid) else { continue };
            match self.read_blob(&desc.blob_name).await? {
                Some(bytes) => {
                    jsons.insert(sid, String::from_utf8_lossy(&bytes).into_owned());
                }
                None => return Err(StoreError::MissingBlob(desc.blob_name.clone())),
            }
        }

        Ok(Some(assemble_from_shards(&manifest, &jsons)?))
    }

    /// Load the complete map: sharded layout first, flat blob as fallback.
    pub async fn load_full(&self) -> Result<Option<CodebaseMap>> {
        let Some(manifest) = self.load_manifest().await? else {
            return self.load_legacy().await;
        };

        let mut jsons: BTreeMap<ShardId, String> = BTreeMap::new();
        for (sid, desc) in &manifest.shards {
            match self.read_blob(&desc.blob_name).await? {
                Some(bytes) => {
                    jsons.insert(sid.clone(), String::from_utf8_lossy(&bytes).into_owned());
                }
                None => return Err(StoreError::MissingBlob(desc.blob_name.clone())),
            }
        }
        Ok(Some(assemble_from_shards(&manifest, &jsons)?))
    }

    async fn load_legacy(&self) -> Result<Option<CodebaseMap>> {
        let Some(bytes) = self.read_blob(&self.legacy_blob_name()).await? else {
            return Ok(None);
        };
        log::info!("loading legacy flat map blob for {}", self.repo_id);
        let map = serde_json::from_slice(&bytes).map_err(|e| StoreError::Structural {
            what: self.legacy_blob_name(),
            cause: e.to_string(),
        })?;
        Ok(Some(map))
    }

    /// Shard the map, write changed blobs plus the manifest, and drop
    /// orphaned shard blobs and any legacy flat blob.
    pub async fn save_map(&self, map: &CodebaseMap, prior: Option<&Manifest>) -> Result<SaveReport> {
        let (manifest, blobs) = split_into_shards(map, prior)?;
        let mut written = Vec::new();
        let mut orphaned = Vec::new();

        for (sid, json) in &blobs {
            let desc = &manifest.shards[sid];
            let path = self.storage_dir.join(&desc.blob_name);
            if !path.exists() {
                self.write_blob(&desc.blob_name, json.as_bytes()).await?;
                written.push(desc.blob_name.clone());
            }
        }

        // Orphans: prior blob names replaced by different content.
        if let Some(prior) = prior {
            for (sid, old_desc) in &prior.shards {
                let replaced = manifest
                    .shards
                    .get(sid)
                    .map(|d| d.blob_name != old_desc.blob_name)
                    .unwrap_or(true);
                if replaced {
                    self.delete_blob(&old_desc.blob_name).await?;
                    orphaned.push(old_desc.blob_name.clone());
                }
            }
        }

        let manifest_json = to_canonical_json(&manifest)?;
        self.write_blob(MANIFEST_BLOB_NAME, manifest_json.as_bytes()).await?;
        written.push(MANIFEST_BLOB_NAME.to_string());

        let legacy = self.legacy_blob_name();
        if self.storage_dir.join(&legacy).exists() {
            self.delete_blob(&legacy).await?;
            orphaned.push(legacy.clone());
            log::info!("removed legacy artifact {legacy}");
        }

        Ok(SaveReport {
            manifest,
            written,
            orphaned,
        })
    }
}

impl ArtifactStore {
    /// Save a partial (dirty-shards-only) map by merging into the prior
    /// manifest. Clean shard descriptors carry over untouched.
    pub async fn save_map_incremental(
        &self,
        partial: &CodebaseMap,
        prior: &Manifest,
        dirty: &std::collections::BTreeSet<argus_core::ShardId>,
        removed_paths: &[FilePath],
    ) -> Result<SaveReport> {
        let (partial_manifest, blobs) = split_into_shards(partial, Some(prior))?;
        let merged = crate::shard::merge_incremental(prior, partial_manifest, dirty, removed_paths);

        let mut written = Vec::new();
        let mut orphaned = Vec::new();

        for (sid, json) in &blobs {
            let desc = &merged.shards[sid];
            let path = self.storage_dir.join(&desc.blob_name);
            if !path.exists() {
                self.write_blob(&desc.blob_name, json.as_bytes()).await?;
                written.push(desc.blob_name.clone());
            }
        }

        for sid in dirty {
            let Some(old_desc) = prior.shards.get(sid) else { continue };
            let replaced = merged
                .shards
                .get(sid)
                .map(|d| d.blob_name != old_desc.blob_name)
                .unwrap_or(true);
            if replaced {
                self.delete_blob(&old_desc.blob_name).await?;
                orphaned.push(old_desc.blob_name.clone());
            }
        }

        let manifest_json = to_canonical_json(&merged)?;
        self.write_blob(MANIFEST_BLOB_NAME, manifest_json.as_bytes()).await?;
        written.push(MANIFEST_BLOB_NAME.to_string());

        Ok(SaveReport {
            manifest: merged,
            written,
            orphaned,
        })
    }
}

/// Outcome of a map save: what the push needs to upload and delete.
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub manifest: Manifest,
    /// Blob names written this save (always includes the manifest).
    pub written: Vec<String>,
    /// Blob names replaced or superseded, to delete from the branch.
    pub orphaned: Vec<String>,
}
