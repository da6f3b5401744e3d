use crate::canonical::{sha256_hex, to_canonical_json};
use crate::error::{Result, StoreError};
use argus_core::{CommitSha, Edge, EdgeKind, FilePath, ShardId};
use argus_map::{CodebaseMap, FileEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const MANIFEST_BLOB_NAME: &str = "manifest.json";

/// Descriptor of one shard blob in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDescriptor {
    pub shard_id: ShardId,
    pub blob_name: String,
    pub content_hash: String,
    pub file_count: usize,
    pub file_paths: Vec<FilePath>,
}

/// A dependency edge whose endpoints lie in different shards.
///
/// Carries the endpoint files so selective loading can map edges to shards
/// without fetching any blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossEdge {
    pub source: String,
    pub kind: EdgeKind,
    pub target: String,
    pub source_file: FilePath,
    pub target_file: FilePath,
}

impl CrossEdge {
    pub fn edge(&self) -> Edge {
        Edge::new(self.source.clone(), self.kind, self.target.clone())
    }

    pub fn source_shard(&self) -> ShardId {
        self.source_file.shard_id()
    }

    pub fn target_shard(&self) -> ShardId {
        self.target_file.shard_id()
    }
}

/// DAG index of shards plus cross-shard edges — the single entry point for
/// selective loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub indexed_at: CommitSha,
    pub shards: BTreeMap<ShardId, ShardDescriptor>,
    pub cross_edges: Vec<CrossEdge>,
}

impl Manifest {
    pub fn shard_for_path(&self, path: &FilePath) -> Option<&ShardDescriptor> {
        self.shards.get(&path.shard_id())
    }

    /// Shards whose file set intersects the given paths ("dirty shards").
    ///
    /// A changed path unknown to any descriptor (an added file) still
    /// dirties its own shard when that shard exists — its entries must be
    /// loaded so the re-shard merges rather than replaces them.
    pub fn dirty_shards(&self, changed: &[FilePath]) -> BTreeSet<ShardId> {
        let changed_set: BTreeSet<&FilePath> = changed.iter().collect();
        let mut dirty: BTreeSet<ShardId> = self
            .shards
            .values()
            .filter(|desc| desc.file_paths.iter().any(|p| changed_set.contains(p)))
            .map(|desc| desc.shard_id.clone())
            .collect();
        for path in changed {
            let sid = path.shard_id();
            if self.shards.contains_key(&sid) {
                dirty.insert(sid);
            }
        }
        dirty
    }
}

/// Serialized contents of one shard blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShardBlob {
    shard_id: ShardId,
    entries: Vec<FileEntry>,
    internal_edges: Vec<Edge>,
}

/// Split a map into per-directory shards.
///
/// Descriptors are carried over from the prior manifest when the content
/// hash is unchanged; cross-edges are recomputed from scratch so the
/// manifest stays authoritative. Returns the manifest plus the canonical
/// JSON for every shard, keyed by shard id.
pub fn split_into_shards(
    map: &CodebaseMap,
    prior: Option<&Manifest>,
) -> Result<(Manifest, BTreeMap<ShardId, String>)> {
    let mut shard_entries: BTreeMap<ShardId, Vec<FileEntry>> = BTreeMap::new();
    for entry in map.entries() {
        shard_entries
            .entry(entry.path.shard_id())
            .or_default()
            .push(entry.clone());
    }

    let mut internal_edges: BTreeMap<ShardId, Vec<Edge>> = BTreeMap::new();
    let mut cross_edges: Vec<CrossEdge> = Vec::new();

    for edge in map.graph.edges() {
        let source_file = edge.source_file();
        let source_shard = source_file.shard_id();

        match edge.target_file() {
            Some(target_file) if target_file.shard_id() != source_shard => {
                cross_edges.push(CrossEdge {
                    source: edge.source.clone(),
                    kind: edge.kind,
                    target: edge.target.clone(),
                    source_file,
                    target_file,
                });
            }
            // Same shard, or unresolved target: stays with its source.
            _ => {
                if shard_entries.contains_key(&source_shard) {
                    internal_edges.entry(source_shard).or_default().push(edge.clone());
                } else {
                    log::debug!("dropping orphan edge from {}", edge.source);
                }
            }
        }
    }

    let mut shards = BTreeMap::new();
    let mut blobs = BTreeMap::new();

    for (shard_id, entries) in shard_entries {
        let file_paths: Vec<FilePath> = entries.iter().map(|e| e.path.clone()).collect();
        let blob = ShardBlob {
            shard_id: shard_id.clone(),
            entries,
            internal_edges: internal_edges.remove(&shard_id).unwrap_or_default(),
        };
        let json = to_canonical_json(&blob)?;
        let content_hash = sha256_hex(json.as_bytes());

        let descriptor = match prior.and_then(|m| m.shards.get(&shard_id)) {
            Some(prev) if prev.content_hash == content_hash => prev.clone(),
            _ => ShardDescriptor {
                shard_id: shard_id.clone(),
                blob_name: format!("shard_{content_hash}.json"),
                content_hash,
                file_count: file_paths.len(),
                file_paths,
            },
        };

        shards.insert(shard_id.clone(), descriptor);
        blobs.insert(shard_id, json);
    }

    let manifest = Manifest {
        indexed_at: map.indexed_at.clone(),
        shards,
        cross_edges,
    };
    Ok((manifest, blobs))
}

/// Assemble a (possibly partial) map from shard blobs.
///
/// Cross-edges with at least one loaded endpoint are restored; their other
/// endpoint may be absent from the partial map — consumers tolerate that.
pub fn assemble_from_shards(
    manifest: &Manifest,
    shard_jsons: &BTreeMap<ShardId, String>,
) -> Result<CodebaseMap> {
    let mut map = CodebaseMap::new(manifest.indexed_at.clone());

    for (shard_id, json) in shard_jsons {
        let blob: ShardBlob =
            serde_json::from_str(json).map_err(|e| StoreError::Structural {
                what: format!("shard {shard_id}"),
                cause: e.to_string(),
            })?;
        for entry in blob.entries {
            map.upsert(entry);
        }
        for edge in blob.internal_edges {
            map.graph.add_edge(edge);
        }
    }

    let loaded: BTreeSet<&ShardId> = shard_jsons.keys().collect();
    for cross in &manifest.cross_edges {
        if loaded.contains(&cross.source_shard()) || loaded.contains(&cross.target_shard()) {
            map.graph.add_edge(cross.edge());
        }
    }

    Ok(map)
}

/// Merge a manifest produced from a partial (dirty-shards-only) map into
/// the prior manifest.
///
/// Descriptors for clean shards carry over untouched. Cross-edges
/// originating in a dirty shard are fully recomputed (they come from the
/// partial manifest); cross-edges originating in clean shards are kept,
/// minus any whose source file was removed.
pub fn merge_incremental(
    prior: &Manifest,
    partial: Manifest,
    dirty: &BTreeSet<ShardId>,
    removed_paths: &[FilePath],
) -> Manifest {
    let removed: BTreeSet<&FilePath> = removed_paths.iter().collect();

    let mut shards = prior.shards.clone();
    for sid in dirty {
        shards.remove(sid);
    }
    for (sid, desc) in partial.shards {
        shards.insert(sid, desc);
    }

    let mut cross_edges: Vec<CrossEdge> = prior
        .cross_edges
        .iter()
        .filter(|e| !dirty.contains(&e.source_shard()) && !removed.contains(&e.source_file))
        .cloned()
        .collect();
    cross_edges.extend(partial.cross_edges);
    cross_edges.sort_by(|a, b| {
        (&a.source, a.kind, &a.target).cmp(&(&b.source, b.kind, &b.target))
    });
    cross_edges.dedup();

    Manifest {
        indexed_at: partial.indexed_at,
        shards,
        cross_edges,
    }
}

/// Shards needed to serve the given paths: their own shards, extended one
/// hop along manifest cross-edges. Exactly one hop — deeper expansion is
/// deliberately closed.
pub fn selected_shards(manifest: &Manifest, required_paths: &[FilePath]) -> BTreeSet<ShardId> {
    let mut required: BTreeSet<ShardId> = required_paths
        .iter()
        .map(|p| p.shard_id())
        .filter(|sid| manifest.shards.contains_key(sid))
        .collect();

    let mut expansion: BTreeSet<ShardId> = BTreeSet::new();
    for cross in &manifest.cross_edges {
        let source_shard = cross.source_shard();
        let target_shard = cross.target_shard();
        if required.contains(&source_shard) && manifest.shards.contains_key(&target_shard) {
            expansion.insert(target_shard);
        } else if required.contains(&target_shard) && manifest.shards.contains_key(&source_shard) {
            expansion.insert(source_shard);
        }
    }

    required.append(&mut expansion);
    required
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{LineRange, Symbol, SymbolKind};

    fn sha(ch: char) -> CommitSha {
        CommitSha::parse(ch.to_string().repeat(40)).unwrap()
    }

    fn entry(path: &str, symbols: &[&str]) -> FileEntry {
        let p = FilePath::new(path);
        FileEntry {
            path: p.clone(),
            language: "python".into(),
            content_hash: format!("hash-of-{path}"),
            last_indexed_sha: sha('a'),
            symbols: symbols
                .iter()
                .map(|name| Symbol {
                    name: name.to_string(),
                    kind: SymbolKind::Function,
                    line_range: LineRange { start: 1, end: 2 },
                    qualified_name: Symbol::qualify(&p, name),
                })
                .collect(),
            imports: vec![],
            exports: symbols.iter().map(|s| s.to_string()).collect(),
            summary: None,
        }
    }

    /// The three-file repo from the bootstrap scenario: a/x.py defines f,
    /// a/y.py calls it, b/z.py defines g.
    fn three_file_map() -> CodebaseMap {
        let mut map = CodebaseMap::new(sha('a'));
        map.upsert(entry("a/x.py", &["f"]));
        map.upsert(entry("a/y.py", &["caller"]));
        map.upsert(entry("b/z.py", &["g"]));
        map.graph
            .add_edge(Edge::new("a/y.py:caller", EdgeKind::Calls, "a/x.py:f"));
        map
    }

    #[test]
    fn bootstrap_sharding_partition() {
        let map = three_file_map();
        let (manifest, blobs) = split_into_shards(&map, None).unwrap();

        assert_eq!(manifest.shards.len(), 2);
        assert_eq!(blobs.len(), 2);

        let a = &manifest.shards[&ShardId::new("a")];
        let b = &manifest.shards[&ShardId::new("b")];
        assert_eq!(a.file_count, 2);
        assert_eq!(b.file_count, 1);
        assert!(a.blob_name.starts_with("shard_") && a.blob_name.ends_with(".json"));
        assert_eq!(a.content_hash.len(), 64);

        // Same-shard call edge stays internal; no cross edges.
        assert!(manifest.cross_edges.is_empty());
        assert!(blobs[&ShardId::new("a")].contains("a/x.py:f"));

        // Partition: shards cover every path exactly once.
        let mut covered: Vec<&FilePath> = manifest
            .shards
            .values()
            .flat_map(|d| d.file_paths.iter())
            .collect();
        covered.sort();
        let all: Vec<&FilePath> = map.files().collect();
        assert_eq!(covered, all);
    }

    #[test]
    fn cross_shard_edges_live_in_the_manifest_only() {
        let mut map = three_file_map();
        map.graph
            .add_edge(Edge::new("a/y.py:caller", EdgeKind::Calls, "b/z.py:g"));

        let (manifest, blobs) = split_into_shards(&map, None).unwrap();
        assert_eq!(manifest.cross_edges.len(), 1);
        let cross = &manifest.cross_edges[0];
        assert_eq!(cross.source_shard(), ShardId::new("a"));
        assert_eq!(cross.target_shard(), ShardId::new("b"));

        // The cross edge appears in no shard blob.
        for json in blobs.values() {
            assert!(!json.contains("b/z.py:g"));
        }
    }

    #[test]
    fn resharding_reuses_descriptors_for_unchanged_shards() {
        let map = three_file_map();
        let (first, _) = split_into_shards(&map, None).unwrap();
        let (second, _) = split_into_shards(&map, Some(&first)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn incremental_edit_replaces_only_the_dirty_shard() {
        let map = three_file_map();
        let (before, _) = split_into_shards(&map, None).unwrap();

        let mut edited = map.clone();
        edited.graph
            .add_edge(Edge::new("a/y.py:caller", EdgeKind::Calls, "b/z.py:g"));
        let (after, _) = split_into_shards(&edited, Some(&before)).unwrap();

        // Shard b untouched: same blob name as before.
        assert_eq!(
            before.shards[&ShardId::new("b")].blob_name,
            after.shards[&ShardId::new("b")].blob_name,
        );
        // The new cross edge is in the manifest.
        assert_eq!(after.cross_edges.len(), 1);
    }

    #[test]
    fn unresolved_edges_stay_in_their_source_shard() {
        let mut map = three_file_map();
        map.graph
            .add_edge(Edge::new("a/y.py:caller", EdgeKind::References, "mystery"));

        let (manifest, blobs) = split_into_shards(&map, None).unwrap();
        assert!(manifest.cross_edges.is_empty());
        assert!(blobs[&ShardId::new("a")].contains("mystery"));
    }

    #[test]
    fn selective_load_equivalence() {
        let mut map = three_file_map();
        map.graph
            .add_edge(Edge::new("a/y.py:caller", EdgeKind::Calls, "b/z.py:g"));
        let (manifest, blobs) = split_into_shards(&map, None).unwrap();

        // Loading every shard reproduces the full map.
        let full = assemble_from_shards(&manifest, &blobs).unwrap();
        assert_eq!(full, map);
    }

    #[test]
    fn one_hop_expansion_follows_cross_edges() {
        let mut map = three_file_map();
        map.graph
            .add_edge(Edge::new("a/y.py:caller", EdgeKind::Calls, "b/z.py:g"));
        let (manifest, blobs) = split_into_shards(&map, None).unwrap();

        // A diff touching only b/z.py pulls shard b, then shard a via the
        // cross edge — and nothing else.
        let selected = selected_shards(&manifest, &[FilePath::new("b/z.py")]);
        assert_eq!(
            selected,
            [ShardId::new("a"), ShardId::new("b")].into_iter().collect()
        );

        let partial_jsons: BTreeMap<ShardId, String> = blobs
            .into_iter()
            .filter(|(sid, _)| selected.contains(sid))
            .collect();
        let partial = assemble_from_shards(&manifest, &partial_jsons).unwrap();

        // Structural queries see y.py:caller as a dependent of g.
        let dependents = partial.graph.dependents("b/z.py:g");
        assert!(dependents.contains("a/y.py:caller"));
    }

    #[test]
    fn hash_stability_across_runs() {
        let (first, first_blobs) = split_into_shards(&three_file_map(), None).unwrap();
        let (second, second_blobs) = split_into_shards(&three_file_map(), None).unwrap();
        assert_eq!(first_blobs, second_blobs);
        for (sid, desc) in &first.shards {
            assert_eq!(desc.content_hash, second.shards[sid].content_hash);
        }
    }

    #[test]
    fn manifest_round_trips_canonically() {
        let (manifest, _) = split_into_shards(&three_file_map(), None).unwrap();
        let json = to_canonical_json(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest, back);
        assert_eq!(json, to_canonical_json(&back).unwrap());
    }

    #[test]
    fn dirty_shards_intersect_changed_files() {
        let (manifest, _) = split_into_shards(&three_file_map(), None).unwrap();
        let dirty = manifest.dirty_shards(&[FilePath::new("a/y.py")]);
        assert_eq!(dirty, [ShardId::new("a")].into_iter().collect());
    }
}
