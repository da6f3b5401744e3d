use crate::types::{FilePath, LineRange};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of code symbol extracted from the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Struct,
    Enum,
    Type,
    Constant,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Type => "type",
            SymbolKind::Constant => "constant",
        }
    }
}

/// A code symbol extracted from a source file.
///
/// `qualified_name` is `<path>:<name>`, unique within a file, and is the
/// node key in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub line_range: LineRange,
    pub qualified_name: String,
}

impl Symbol {
    pub fn qualify(path: &FilePath, name: &str) -> String {
        format!("{}:{}", path.as_str(), name)
    }
}

/// Kind of dependency between symbols or files.
///
/// Declaration order drives the derived `Ord`, which in turn fixes the
/// serialized edge order inside shard blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Imports,
    Calls,
    Extends,
    Implements,
    References,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::Imports => "imports",
            EdgeKind::Calls => "calls",
            EdgeKind::Extends => "extends",
            EdgeKind::Implements => "implements",
            EdgeKind::References => "references",
        };
        f.write_str(s)
    }
}

/// A directed dependency edge.
///
/// `source` is a qualified name (`path:symbol`) or a bare file path for
/// module-level edges. `target` is a qualified name, a file path, or a
/// bare symbol name that never resolved. Field order fixes the derived
/// `Ord` at `(source, kind, target)` so edge collections sort and hash
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub kind: EdgeKind,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, kind: EdgeKind, target: impl Into<String>) -> Self {
        Edge {
            source: source.into(),
            kind,
            target: target.into(),
        }
    }

    /// The file the edge originates in. Determines the edge's shard.
    pub fn source_file(&self) -> FilePath {
        FilePath::new(node_file(&self.source))
    }

    /// The file the target resolves into, if the target is resolved.
    ///
    /// A bare identifier with no path separator and no extension is an
    /// unresolved reference; consumers must tolerate `None`.
    pub fn target_file(&self) -> Option<FilePath> {
        if self.target.contains(':') {
            return Some(FilePath::new(node_file(&self.target)));
        }
        if self.target.contains('/') || self.target.contains('.') {
            return Some(FilePath::new(self.target.as_str()));
        }
        None
    }

    pub fn is_resolved(&self) -> bool {
        self.target_file().is_some()
    }
}

/// File component of a graph node key (`path:symbol` or bare `path`).
pub(crate) fn node_file(node: &str) -> &str {
    match node.find(':') {
        Some(idx) => &node[..idx],
        None => node,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_carry_the_path() {
        let p = FilePath::new("a/x.py");
        assert_eq!(Symbol::qualify(&p, "f"), "a/x.py:f");
    }

    #[test]
    fn edge_shard_placement_fields() {
        let e = Edge::new("a/y.py:caller", EdgeKind::Calls, "a/x.py:f");
        assert_eq!(e.source_file().as_str(), "a/y.py");
        assert_eq!(e.target_file().unwrap().as_str(), "a/x.py");
        assert!(e.is_resolved());
    }

    #[test]
    fn unresolved_target_has_no_file() {
        let e = Edge::new("a/y.py:caller", EdgeKind::References, "mystery");
        assert_eq!(e.target_file(), None);
        assert!(!e.is_resolved());
    }

    #[test]
    fn import_edge_targets_a_file() {
        let e = Edge::new("a/y.py", EdgeKind::Imports, "b/z.py");
        assert_eq!(e.target_file().unwrap().as_str(), "b/z.py");
    }

    #[test]
    fn edges_order_by_source_then_kind_then_target() {
        let a = Edge::new("a", EdgeKind::Imports, "z");
        let b = Edge::new("a", EdgeKind::Calls, "a");
        let c = Edge::new("b", EdgeKind::Imports, "a");
        let mut v = vec![c.clone(), b.clone(), a.clone()];
        v.sort();
        assert_eq!(v, vec![a, b, c]);
    }
}
