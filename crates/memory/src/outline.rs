use argus_core::{FilePath, SymbolKind};
use argus_map::CodebaseMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One file's line in the rendered outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    pub path: FilePath,
    pub symbols_text: String,
}

/// The structural outline of a codebase, persisted alongside patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseOutline {
    pub files: Vec<OutlineEntry>,
}

impl CodebaseOutline {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Which files an outline covers.
#[derive(Debug, Clone)]
pub enum OutlineScope {
    /// Every file in the map.
    Full,
    /// Changed files plus their one-hop graph neighbors.
    Scoped(Vec<FilePath>),
}

/// Renders a compact outline within a character budget.
///
/// Rendering is deterministic: files in lexicographic order, per-file
/// symbol lists cut after `per_file_symbols` entries with an explicit
/// `…(+K more)` marker, and a global character cutoff.
#[derive(Debug, Clone)]
pub struct OutlineRenderer {
    pub char_budget: usize,
    pub per_file_symbols: usize,
}

impl OutlineRenderer {
    pub fn new(char_budget: usize) -> Self {
        OutlineRenderer {
            char_budget,
            per_file_symbols: 12,
        }
    }

    pub fn render(&self, map: &CodebaseMap, scope: &OutlineScope) -> (String, CodebaseOutline) {
        let selected: Vec<&FilePath> = match scope {
            OutlineScope::Full => map.files().collect(),
            OutlineScope::Scoped(changed) => scoped_files(map, changed),
        };

        let mut text = String::new();
        let mut files = Vec::new();

        for path in selected {
            let Some(entry) = map.get(path) else { continue };
            let symbols_text = self.render_symbols(entry.symbols.iter().map(|s| (s.name.as_str(), s.kind)));
            let line = format!("{path}: {symbols_text}\n");

            if text.len() + line.len() > self.char_budget {
                log::debug!("outline budget reached at {path} ({} chars)", text.len());
                break;
            }
            text.push_str(&line);
            files.push(OutlineEntry {
                path: path.clone(),
                symbols_text,
            });
        }

        (text, CodebaseOutline { files })
    }

    fn render_symbols<'a>(&self, symbols: impl Iterator<Item = (&'a str, SymbolKind)>) -> String {
        let all: Vec<String> = symbols
            .map(|(name, kind)| format!("{name}({})", kind_code(kind)))
            .collect();
        if all.is_empty() {
            return String::from("-");
        }
        if all.len() <= self.per_file_symbols {
            return all.join(", ");
        }
        let shown = all[..self.per_file_symbols].join(", ");
        format!("{shown}, …(+{} more)", all.len() - self.per_file_symbols)
    }
}

/// Changed files plus every file sharing an edge with them. Result is
/// sorted and deduplicated, ready for lexicographic rendering.
fn scoped_files<'a>(map: &'a CodebaseMap, changed: &[FilePath]) -> Vec<&'a FilePath> {
    let changed_set: BTreeSet<&FilePath> = changed.iter().collect();
    let mut selected: BTreeSet<FilePath> = changed.iter().cloned().collect();

    for edge in map.graph.edges() {
        let source = edge.source_file();
        let target = edge.target_file();
        if changed_set.contains(&source) {
            if let Some(t) = target {
                selected.insert(t);
            }
        } else if let Some(t) = &target {
            if changed_set.contains(t) {
                selected.insert(source);
            }
        }
    }

    selected
        .into_iter()
        .filter_map(|p| map.get(&p).map(|entry| &entry.path))
        .collect()
}

fn kind_code(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Function => "f",
        SymbolKind::Method => "m",
        SymbolKind::Class => "c",
        SymbolKind::Interface => "i",
        SymbolKind::Struct => "s",
        SymbolKind::Enum => "e",
        SymbolKind::Type => "t",
        SymbolKind::Constant => "k",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{CommitSha, Edge, EdgeKind, LineRange, Symbol};
    use argus_map::FileEntry;

    fn sha() -> CommitSha {
        CommitSha::parse("c".repeat(40)).unwrap()
    }

    fn file(path: &str, symbols: &[&str]) -> FileEntry {
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
                    line_range: LineRange { start: 1, end: 3 },
                    qualified_name: Symbol::qualify(&p, name),
                })
                .collect(),
            imports: vec![],
            exports: vec![],
            summary: None,
        }
    }

    fn sample_map() -> CodebaseMap {
        let mut map = CodebaseMap::new(sha());
        map.upsert(file("a/x.py", &["f"]));
        map.upsert(file("a/y.py", &["caller"]));
        map.upsert(file("b/z.py", &["g"]));
        map.graph
            .add_edge(Edge::new("a/y.py:caller", EdgeKind::Calls, "a/x.py:f"));
        map
    }

    #[test]
    fn full_outline_is_lexicographic() {
        let (text, outline) = OutlineRenderer::new(10_000).render(&sample_map(), &OutlineScope::Full);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("a/x.py: f(f)"));
        assert!(lines[2].starts_with("b/z.py: g(f)"));
        assert_eq!(outline.files.len(), 3);
    }

    #[test]
    fn scoped_outline_pulls_one_hop_neighbors() {
        let scope = OutlineScope::Scoped(vec![FilePath::new("a/x.py")]);
        let (text, outline) = OutlineRenderer::new(10_000).render(&sample_map(), &scope);
        // a/y.py is a dependent of a/x.py; b/z.py is unrelated.
        assert!(text.contains("a/x.py"));
        assert!(text.contains("a/y.py"));
        assert!(!text.contains("b/z.py"));
        assert_eq!(outline.files.len(), 2);
    }

    #[test]
    fn per_file_truncation_marker() {
        let names: Vec<String> = (0..20).map(|i| format!("s{i:02}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut map = CodebaseMap::new(sha());
        map.upsert(file("big.py", &name_refs));

        let renderer = OutlineRenderer::new(10_000);
        let (text, _) = renderer.render(&map, &OutlineScope::Full);
        assert!(text.contains("…(+8 more)"));
    }

    #[test]
    fn global_budget_cuts_whole_files() {
        let (text, outline) = OutlineRenderer::new(20).render(&sample_map(), &OutlineScope::Full);
        assert!(text.len() <= 20);
        assert!(outline.files.len() < 3);
    }

    #[test]
    fn symbolless_file_renders_a_dash() {
        let mut map = CodebaseMap::new(sha());
        map.upsert(file("empty.py", &[]));
        let (text, _) = OutlineRenderer::new(1_000).render(&map, &OutlineScope::Full);
        assert_eq!(text, "empty.py: -\n");
    }
}
