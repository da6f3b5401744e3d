use crate::entry::FileEntry;
use crate::error::{IndexingError, Result};
use crate::map::CodebaseMap;
use argus_core::{CommitSha, Edge, EdgeKind, FilePath};
use argus_parser::SourceParser;
use globset::GlobSet;
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One changed path between two commits.
#[derive(Debug, Clone)]
pub enum FileChange {
    /// Added or modified file with its new content.
    Upsert { path: FilePath, content: Vec<u8> },
    /// Removed file.
    Remove { path: FilePath },
}

/// Builds and updates the codebase map.
///
/// A per-file parse failure degrades that file to an empty entry; a
/// structural failure (missing root, unreadable file) aborts the build.
pub struct IndexingService {
    parser: SourceParser,
    ignored: GlobSet,
}

impl IndexingService {
    pub fn new(parser: SourceParser, ignored: GlobSet) -> Self {
        IndexingService { parser, ignored }
    }

    /// Walk every source file under `root` and build a fresh map.
    pub fn full_build(&self, root: &Path, target_sha: CommitSha) -> Result<CodebaseMap> {
        if !root.is_dir() {
            return Err(IndexingError::MissingRoot(root.display().to_string()));
        }

        let mut map = CodebaseMap::new(target_sha.clone());
        let mut parsed = 0usize;

        for result in WalkBuilder::new(root).hidden(false).build() {
            let dir_entry = result.map_err(|e| IndexingError::Structural {
                stage: "walk",
                path: root.display().to_string(),
                cause: e.to_string(),
            })?;
            if !dir_entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let rel = dir_entry
                .path()
                .strip_prefix(root)
                .unwrap_or(dir_entry.path());
            let path = FilePath::new(rel.to_string_lossy());
            if self.ignored.is_match(path.as_str()) {
                continue;
            }
            if !self.parser.language_table().is_source_file(&path) {
                continue;
            }

            let bytes = std::fs::read(dir_entry.path()).map_err(|e| IndexingError::Structural {
                stage: "read",
                path: path.to_string(),
                cause: e.to_string(),
            })?;

            if let Some((entry, edges)) = self.parse_file(&path, &bytes, &target_sha) {
                parsed += 1;
                map.upsert(entry);
                for edge in edges {
                    map.graph.add_edge(edge);
                }
            }
        }

        link_edges(&mut map);
        log::info!(
            "full index: {} files, {} edges at {}",
            parsed,
            map.graph.edge_count(),
            target_sha.short(),
        );
        Ok(map)
    }

    /// Apply a set of changes to a prior map.
    pub fn incremental(
        &self,
        mut prior: CodebaseMap,
        changes: &[FileChange],
        target_sha: CommitSha,
    ) -> Result<CodebaseMap> {
        let mut upserted = 0usize;
        let mut removed = 0usize;

        for change in changes {
            match change {
                FileChange::Remove { path } => {
                    if prior.remove(path).is_some() {
                        removed += 1;
                    }
                }
                FileChange::Upsert { path, content } => {
                    if self.ignored.is_match(path.as_str()) {
                        continue;
                    }
                    prior.graph.remove_edges_from(path);
                    if let Some((entry, edges)) = self.parse_file(path, content, &target_sha) {
                        prior.upsert(entry);
                        for edge in edges {
                            prior.graph.add_edge(edge);
                        }
                        upserted += 1;
                    }
                }
            }
        }

        prior.indexed_at = target_sha.clone();
        link_edges(&mut prior);
        log::info!(
            "incremental index: +{} -{} files, {} edges at {}",
            upserted,
            removed,
            prior.graph.edge_count(),
            target_sha.short(),
        );
        Ok(prior)
    }

    /// Parse one file into an entry plus its local edges.
    ///
    /// `None` means the path is not a supported source file. A real parse
    /// failure degrades to an empty entry so one bad file never poisons
    /// the map.
    fn parse_file(
        &self,
        path: &FilePath,
        bytes: &[u8],
        sha: &CommitSha,
    ) -> Option<(FileEntry, Vec<Edge>)> {
        let language = self.parser.language_table().language_for(path).ok()?;
        let content_hash = hex_sha256(bytes);

        match self.parser.parse(path, bytes) {
            Ok(parsed) => {
                let entry = FileEntry {
                    path: path.clone(),
                    language: parsed.language.as_str().to_string(),
                    content_hash,
                    last_indexed_sha: sha.clone(),
                    symbols: parsed.symbols,
                    imports: parsed.imports,
                    exports: parsed.exports,
                    summary: None,
                };
                Some((entry, parsed.edges))
            }
            Err(e) => {
                log::warn!("degrading {path} to empty entry: {e}");
                let entry = FileEntry::degraded(
                    path.clone(),
                    language.as_str(),
                    content_hash,
                    sha.clone(),
                );
                Some((entry, Vec::new()))
            }
        }
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Resolve edge targets across the whole map: first by symbol name, then by
/// import statement. Targets that resolve nowhere stay as bare names —
/// consumers tolerate unresolved edges by contract.
fn link_edges(map: &mut CodebaseMap) {
    let new_edges: BTreeSet<Edge> = {
        let name_index = map.symbol_name_index();
        let known: BTreeSet<&str> = map.files().map(|p| p.as_str()).collect();
        map.graph
            .edges()
            .map(|e| resolve_edge(e, &name_index, &known))
            .collect()
    };
    map.graph.replace_edges(new_edges);
}

fn resolve_edge(
    edge: &Edge,
    name_index: &BTreeMap<&str, Vec<&str>>,
    known: &BTreeSet<&str>,
) -> Edge {
    // Already a qualified name or a known file: nothing to do.
    if edge.target.contains(':') || known.contains(edge.target.as_str()) {
        return edge.clone();
    }

    if edge.kind == EdgeKind::Imports {
        if let Some(path) = resolve_import(&edge.target, &edge.source_file(), known) {
            return Edge::new(edge.source.clone(), edge.kind, path);
        }
        return edge.clone();
    }

    // Symbol-name resolution. Qualified candidates are sorted, so picking
    // the first foreign match is deterministic.
    if let Some(candidates) = name_index.get(edge.target.as_str()) {
        let source_file = edge.source_file();
        let foreign = candidates
            .iter()
            .find(|q| !q.starts_with(&format!("{}:", source_file)));
        let chosen = foreign.or_else(|| candidates.first());
        if let Some(qualified) = chosen {
            return Edge::new(edge.source.clone(), edge.kind, qualified.to_string());
        }
    }

    edge.clone()
}

const PROBE_EXTENSIONS: [&str; 13] = [
    "py", "rs", "js", "jsx", "ts", "tsx", "go", "java", "c", "cpp", "cs", "rb", "php",
];

/// Map a raw import string onto a known repository file, or `None`.
fn resolve_import(raw: &str, from: &FilePath, known: &BTreeSet<&str>) -> Option<String> {
    let mut candidates: Vec<String> = Vec::new();

    if raw.starts_with("./") || raw.starts_with("../") {
        let dir = from.shard_id();
        candidates.push(normalize_join(dir.as_str(), raw));
    } else {
        candidates.push(raw.to_string());
        if raw.contains('.') && !raw.contains('/') {
            candidates.push(raw.replace('.', "/"));
        }
    }

    for candidate in candidates {
        if known.contains(candidate.as_str()) {
            return Some(candidate);
        }
        for ext in PROBE_EXTENSIONS {
            let with_ext = format!("{candidate}.{ext}");
            if known.contains(with_ext.as_str()) {
                return Some(with_ext);
            }
        }
    }
    None
}

/// Join a relative import onto a directory, resolving `.` and `..`.
fn normalize_join(dir: &str, rel: &str) -> String {
    let mut parts: Vec<&str> = if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };
    for piece in rel.split('/') {
        match piece {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
