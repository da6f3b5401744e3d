use crate::artifact::ArtifactStore;
use crate::error::{Result, StoreError};
use crate::github::{GitHubClient, NewTreeEntry};
use crate::shard::{assemble_from_shards, selected_shards, Manifest, MANIFEST_BLOB_NAME};
use argus_core::{FilePath, ShardId};
use argus_map::CodebaseMap;
use std::collections::BTreeMap;

/// Orphan branch that carries the persisted artifacts.
pub const DATA_BRANCH: &str = "argus-data";

/// Per-run sync state: `Idle → Pulling → Loaded → Writing → Pushed`.
/// The review path ends at `Loaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Pulling,
    Loaded,
    Writing,
    Pushed,
    PullFailed,
    PushFailed,
}

/// Frozen snapshot of the branch taken at the first pull.
///
/// Read once per run and never refreshed, so every read in the run
/// observes the same tree.
#[derive(Debug, Clone)]
pub struct TreeCache {
    pub ref_sha: String,
    pub tree_sha: String,
    /// Blob path → git blob SHA for every file on the branch.
    pub entries: BTreeMap<String, String>,
}

impl TreeCache {
    /// Names of optional artifacts discovered on the branch.
    pub fn names_with_suffix(&self, suffix: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|name| name.ends_with(suffix))
            .cloned()
            .collect()
    }
}

/// What the manifest read found on the branch.
#[derive(Debug)]
pub enum PullOutcome {
    /// Branch or manifest absent: start from an empty state.
    Empty,
    /// Pre-sharding flat blob; replaced and deleted on the next save.
    Legacy(Box<CodebaseMap>),
    /// Sharded layout.
    Sharded(Manifest),
}

/// Selective sync against the data branch.
///
/// Pull fetches the manifest and exactly the shard blobs a run needs;
/// push creates a tree on top of the previous one, uploading only new
/// blobs, and moves the ref with a fast-forward (CAS) update. On a CAS
/// mismatch the caller re-pulls, recomputes its artifacts against the new
/// manifest, and retries once; a second mismatch stays `ConcurrentWrite`.
pub struct BranchSync {
    client: GitHubClient,
    branch: String,
    store: ArtifactStore,
    state: SyncState,
    tree: Option<TreeCache>,
}

impl BranchSync {
    pub fn new(client: GitHubClient, store: ArtifactStore) -> Self {
        BranchSync {
            client,
            branch: DATA_BRANCH.to_string(),
            store,
            state: SyncState::Idle,
            tree: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn tree_cache(&self) -> Option<&TreeCache> {
        self.tree.as_ref()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Pull steps 1–3: branch ref, recursive tree (frozen for the run),
    /// and the manifest.
    pub async fn pull_manifest(&mut self) -> Result<PullOutcome> {
        self.state = SyncState::Pulling;
        match self.pull_manifest_inner().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.state = SyncState::PullFailed;
                Err(e)
            }
        }
    }

    async fn pull_manifest_inner(&mut self) -> Result<PullOutcome> {
        let Some(ref_sha) = self.client.get_branch_sha(&self.branch).await? else {
            log::info!("branch {} absent, starting empty", self.branch);
            self.tree = None;
            return Ok(PullOutcome::Empty);
        };

        let tree_sha = self.client.get_commit_tree_sha(&ref_sha).await?;
        let entries: BTreeMap<String, String> = self
            .client
            .get_tree_recursive(&tree_sha)
            .await?
            .into_iter()
            .filter(|e| e.entry_type == "blob")
            .map(|e| (e.path, e.sha))
            .collect();
        self.tree = Some(TreeCache {
            ref_sha,
            tree_sha,
            entries,
        });

        if let Some(bytes) = self.fetch_blob(MANIFEST_BLOB_NAME).await? {
            let manifest = serde_json::from_slice(&bytes).map_err(|e| StoreError::Structural {
                what: MANIFEST_BLOB_NAME.to_string(),
                cause: e.to_string(),
            })?;
            return Ok(PullOutcome::Sharded(manifest));
        }

        // No manifest on the branch: fall back to the flat layout.
        let legacy_name = self.store.legacy_blob_name();
        if let Some(bytes) = self.fetch_blob(&legacy_name).await? {
            let map = serde_json::from_slice(&bytes).map_err(|e| StoreError::Structural {
                what: legacy_name,
                cause: e.to_string(),
            })?;
            return Ok(PullOutcome::Legacy(Box::new(map)));
        }

        Ok(PullOutcome::Empty)
    }

    /// Review path: manifest → shards of the required paths extended one
    /// hop on cross-edges → partial map.
    pub async fn pull_for_review(
        &mut self,
        required_paths: &[FilePath],
    ) -> Result<(Option<Manifest>, Option<CodebaseMap>)> {
        let outcome = self.pull_manifest().await?;
        let result = match outcome {
            PullOutcome::Empty => (None, None),
            PullOutcome::Legacy(map) => (None, Some(*map)),
            PullOutcome::Sharded(manifest) => {
                let shard_ids = selected_shards(&manifest, required_paths);
                let map = self.fetch_and_assemble(&manifest, shard_ids).await?;
                (Some(manifest), Some(map))
            }
        };
        self.state = SyncState::Loaded;
        Ok(result)
    }

    /// Index path: fetch a specific shard set (the dirty shards) against
    /// an already-pulled manifest.
    pub async fn pull_shards(
        &mut self,
        manifest: &Manifest,
        shard_ids: impl IntoIterator<Item = ShardId>,
    ) -> Result<CodebaseMap> {
        let map = self.fetch_and_assemble(manifest, shard_ids).await?;
        self.state = SyncState::Loaded;
        Ok(map)
    }

    /// Fetch an optional artifact (memory, embeddings) discovered from the
    /// cached tree, mirroring it into the local store. `false` if absent.
    pub async fn pull_optional_blob(&self, name: &str) -> Result<bool> {
        Ok(self.fetch_blob(name).await?.is_some())
    }

    /// Optional artifact names present on the branch.
    pub fn discovered_blobs(&self, suffix: &str) -> Vec<String> {
        self.tree
            .as_ref()
            .map(|t| t.names_with_suffix(suffix))
            .unwrap_or_default()
    }

    async fn fetch_and_assemble(
        &self,
        manifest: &Manifest,
        shard_ids: impl IntoIterator<Item = ShardId>,
    ) -> Result<CodebaseMap> {
        let wanted: Vec<&crate::shard::ShardDescriptor> = shard_ids
            .into_iter()
            .filter_map(|sid| manifest.shards.get(&sid))
            .collect();

        // Shard blobs fetch concurrently; the frozen tree keeps the reads
        // consistent no matter the completion order.
        let fetches = wanted.iter().map(|desc| self.fetch_blob(&desc.blob_name));
        let results = futures::future::join_all(fetches).await;

        let mut jsons: BTreeMap<ShardId, String> = BTreeMap::new();
        for (desc, fetched) in wanted.iter().zip(results) {
            match fetched? {
                Some(bytes) => {
                    jsons.insert(
                        desc.shard_id.clone(),
                        String::from_utf8_lossy(&bytes).into_owned(),
                    );
                }
                None => return Err(StoreError::MissingBlob(desc.blob_name.clone())),
            }
        }

        log::info!("pulled {} shard blobs from {}", jsons.len(), self.branch);
        assemble_from_shards(manifest, &jsons)
    }

    async fn fetch_blob(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(tree) = &self.tree else {
            return Ok(None);
        };
        let Some(sha) = tree.entries.get(name) else {
            return Ok(None);
        };
        let bytes = self.client.get_blob(sha).await?;
        self.store.write_blob(name, &bytes).await?;
        Ok(Some(bytes))
    }

    /// Push protocol: upload new blobs, build a tree on the previous one,
    /// commit, and fast-forward the ref.
    ///
    /// `blobs` are `(name, bytes)` pairs to publish; `deletions` are names
    /// removed from the branch (orphaned shards, the legacy flat blob).
    /// Content-addressed blob names already present on the branch are
    /// reused without re-uploading — the name encodes the content hash.
    pub async fn push(
        &mut self,
        blobs: Vec<(String, Vec<u8>)>,
        deletions: Vec<String>,
        message: &str,
    ) -> Result<()> {
        self.state = SyncState::Writing;
        match self.push_inner(blobs, deletions, message).await {
            Ok(()) => {
                self.state = SyncState::Pushed;
                Ok(())
            }
            Err(e) => {
                self.state = SyncState::PushFailed;
                Err(e)
            }
        }
    }

    async fn push_inner(
        &mut self,
        blobs: Vec<(String, Vec<u8>)>,
        deletions: Vec<String>,
        message: &str,
    ) -> Result<()> {
        if self.tree.is_none() {
            // A push without a prior pull (fresh bootstrap) still needs to
            // know whether the branch exists.
            let _ = self.pull_manifest_inner().await?;
        }

        let (parent, base_tree, existing) = match &self.tree {
            Some(t) => (
                Some(t.ref_sha.clone()),
                Some(t.tree_sha.clone()),
                t.entries.clone(),
            ),
            None => (None, None, BTreeMap::new()),
        };

        let mut entries: Vec<NewTreeEntry> = Vec::new();
        let mut uploaded = 0usize;
        let mut reused = 0usize;

        for (name, bytes) in blobs {
            let content_addressed = name.starts_with("shard_");
            if content_addressed {
                if let Some(sha) = existing.get(&name) {
                    entries.push(NewTreeEntry::blob(name, sha.clone()));
                    reused += 1;
                    continue;
                }
            }
            let sha = self.client.create_blob(&bytes).await?;
            entries.push(NewTreeEntry::blob(name, sha));
            uploaded += 1;
        }

        for name in deletions {
            if existing.contains_key(&name) {
                entries.push(NewTreeEntry::delete(name));
            }
        }

        let tree_sha = self.client.create_tree(base_tree.as_deref(), &entries).await?;
        let parents: Vec<String> = parent.iter().cloned().collect();
        let commit_sha = self.client.create_commit(message, &tree_sha, &parents).await?;

        match &parent {
            None => self.client.create_ref(&self.branch, &commit_sha).await?,
            Some(_) => self.client.update_ref(&self.branch, &commit_sha).await?,
        }

        log::info!(
            "pushed {} to {}: {} uploaded, {} reused",
            commit_sha.get(..12).unwrap_or(&commit_sha),
            self.branch,
            uploaded,
            reused,
        );

        // The branch moved (our own commit); the frozen snapshot is stale.
        self.tree = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_cache_discovers_optional_artifacts() {
        let cache = TreeCache {
            ref_sha: "r".into(),
            tree_sha: "t".into(),
            entries: [
                ("manifest.json".to_string(), "s1".to_string()),
                ("abcd_memory.json".to_string(), "s2".to_string()),
                ("ef01_embeddings.json".to_string(), "s3".to_string()),
                ("shard_ff.json".to_string(), "s4".to_string()),
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(cache.names_with_suffix("_memory.json"), vec!["abcd_memory.json"]);
        assert_eq!(
            cache.names_with_suffix("_embeddings.json"),
            vec!["ef01_embeddings.json"]
        );
    }
}
