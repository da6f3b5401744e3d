use crate::entry::FileEntry;
use crate::graph::DependencyGraph;
use argus_core::{CommitSha, FilePath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate root — the semantic map of a repository at a commit.
///
/// Entries are keyed by path in sorted order so serialization is
/// deterministic. A partial map (subset of shards loaded) has exactly the
/// same shape as a full map; edge targets may simply be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodebaseMap {
    pub indexed_at: CommitSha,
    entries: BTreeMap<FilePath, FileEntry>,
    pub graph: DependencyGraph,
}

impl CodebaseMap {
    pub fn new(indexed_at: CommitSha) -> Self {
        CodebaseMap {
            indexed_at,
            entries: BTreeMap::new(),
            graph: DependencyGraph::new(),
        }
    }

    /// Add or replace a file entry. Does not touch the graph; the indexing
    /// service owns edge lifecycle.
    pub fn upsert(&mut self, entry: FileEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    /// Remove an entry and every edge touching its file.
    pub fn remove(&mut self, path: &FilePath) -> Option<FileEntry> {
        let removed = self.entries.remove(path);
        if removed.is_some() {
            self.graph.remove_edges_touching(path);
        }
        removed
    }

    pub fn get(&self, path: &FilePath) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &FilePath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &FilePath> {
        self.entries.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookup of symbol name → qualified names across the whole map,
    /// used by the edge linker and by retrieval tooling. Deterministic:
    /// qualified names per name are sorted.
    pub fn symbol_name_index(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut index: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for entry in self.entries.values() {
            for symbol in &entry.symbols {
                let short = symbol.name.rsplit('.').next().unwrap_or(&symbol.name);
                index.entry(short).or_default().push(&symbol.qualified_name);
            }
        }
        for names in index.values_mut() {
            names.sort_unstable();
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{Edge, EdgeKind, LineRange, Symbol, SymbolKind};

    fn sha() -> CommitSha {
        CommitSha::parse("a".repeat(40)).unwrap()
    }

    fn entry(path: &str, symbols: &[&str]) -> FileEntry {
        let p = FilePath::new(path);
        FileEntry {
            path: p.clone(),
            language: "python".into(),
            content_hash: "h".into(),
            last_indexed_sha: sha(),
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

    #[test]
    fn upsert_and_remove_keep_graph_consistent() {
        let mut map = CodebaseMap::new(sha());
        map.upsert(entry("a/x.py", &["f"]));
        map.upsert(entry("a/y.py", &["caller"]));
        map.graph
            .add_edge(Edge::new("a/y.py:caller", EdgeKind::Calls, "a/x.py:f"));

        assert_eq!(map.len(), 2);
        map.remove(&FilePath::new("a/x.py"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.graph.edge_count(), 0);
    }

    #[test]
    fn symbol_name_index_uses_short_names() {
        let mut map = CodebaseMap::new(sha());
        map.upsert(entry("svc.py", &["Service.run"]));
        let index = map.symbol_name_index();
        assert_eq!(index.get("run").unwrap(), &vec!["svc.py:Service.run"]);
    }

    #[test]
    fn map_round_trips_through_serde() {
        let mut map = CodebaseMap::new(sha());
        map.upsert(entry("a/x.py", &["f"]));
        map.graph
            .add_edge(Edge::new("a/y.py:caller", EdgeKind::Calls, "a/x.py:f"));

        let json = serde_json::to_string(&map).unwrap();
        let back: CodebaseMap = serde_json::from_str(&json).unwrap();
        assert_eq!(map, back);
    }
}
