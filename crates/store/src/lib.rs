//! # Argus Store
//!
//! Sharded persistence for the codebase map, plus the selective branch sync
//! that keeps artifacts on an orphan branch of the reviewed repository.
//!
//! The layout on the branch:
//!
//! ```text
//! manifest.json
//! shard_<64-hex>.json          one per leaf directory
//! <hash>_memory.json           optional
//! <hash>_embeddings.json       optional
//! ```
//!
//! Shard blobs are content-addressed: the name is derived from the SHA-256
//! of the canonical JSON bytes, so identical shard contents reuse the same
//! blob across runs and pushes never re-upload unchanged shards.

mod artifact;
mod canonical;
mod embeddings;
mod error;
mod github;
mod memory_store;
mod shard;
mod sync;

pub use artifact::{ArtifactStore, SaveReport};
pub use canonical::{sha256_hex, to_canonical_json};
pub use embeddings::{embedding_blob_name, EmbeddingIndex};
pub use error::{Result, StoreError};
pub use github::{
    GitHubClient, IssueRef, NewTreeEntry, PullRequestInfo, ReviewCommentPayload, TreeEntry,
};
pub use memory_store::{memory_blob_name, MemoryStore};
pub use shard::{
    assemble_from_shards, merge_incremental, selected_shards, split_into_shards, CrossEdge,
    Manifest, ShardDescriptor, MANIFEST_BLOB_NAME,
};
pub use sync::{BranchSync, PullOutcome, SyncState, TreeCache, DATA_BRANCH};
