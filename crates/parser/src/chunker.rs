use argus_core::{FilePath, LineRange, Symbol};
use serde::{Deserialize, Serialize};

/// A chunk of source split at symbol boundaries.
///
/// Retrieval-only: chunks are rebuilt from the working tree every run and
/// never persisted. Each chunk is a coherent unit — a function body, a class
/// header, or a contiguous run of top-level lines between symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub file_path: FilePath,
    pub line_range: LineRange,
    pub text: String,
    pub anchor_symbol: Option<String>,
}

impl CodeChunk {
    /// Identity used by retrieval fingerprinting and vector indices.
    pub fn chunk_id(&self) -> String {
        format!("{}:{}:{}", self.file_path, self.line_range.start, self.line_range.end)
    }
}

/// Split a file into chunks around its symbols.
///
/// Outermost symbols become one chunk each (nested methods stay inside
/// their class chunk); line runs between symbols become anchorless chunks.
/// A file with no symbols yields a single whole-file chunk.
pub fn chunk_source(path: &FilePath, content: &str, symbols: &[Symbol]) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }
    let total = lines.len() as u32;

    let outermost = outermost_symbols(symbols);
    if outermost.is_empty() {
        return vec![make_chunk(path, &lines, 1, total, None)];
    }

    let mut chunks = Vec::new();
    let mut next_line = 1u32;

    for symbol in &outermost {
        let start = symbol.line_range.start.min(total);
        let end = symbol.line_range.end.min(total);

        if start > next_line {
            let gap = make_chunk(path, &lines, next_line, start - 1, None);
            if !gap.text.trim().is_empty() {
                chunks.push(gap);
            }
        }
        chunks.push(make_chunk(path, &lines, start, end, Some(symbol.name.clone())));
        next_line = end + 1;
    }

    if next_line <= total {
        let tail = make_chunk(path, &lines, next_line, total, None);
        if !tail.text.trim().is_empty() {
            chunks.push(tail);
        }
    }

    chunks
}

/// Symbols not contained in another symbol's range, ordered by position.
fn outermost_symbols(symbols: &[Symbol]) -> Vec<&Symbol> {
    let mut sorted: Vec<&Symbol> = symbols.iter().collect();
    sorted.sort_by_key(|s| (s.line_range.start, std::cmp::Reverse(s.line_range.end)));

    let mut result: Vec<&Symbol> = Vec::new();
    let mut covered_until = 0u32;
    for symbol in sorted {
        if symbol.line_range.start <= covered_until {
            continue;
        }
        covered_until = symbol.line_range.end;
        result.push(symbol);
    }
    result
}

fn make_chunk(
    path: &FilePath,
    lines: &[&str],
    start: u32,
    end: u32,
    anchor: Option<String>,
) -> CodeChunk {
    let text = lines[(start as usize - 1)..(end as usize)].join("\n");
    CodeChunk {
        file_path: path.clone(),
        line_range: LineRange { start, end },
        text,
        anchor_symbol: anchor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::SymbolKind;

    fn sym(name: &str, start: u32, end: u32) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind: SymbolKind::Function,
            line_range: LineRange { start, end },
            qualified_name: format!("f.py:{name}"),
        }
    }

    #[test]
    fn no_symbols_gives_one_whole_file_chunk() {
        let path = FilePath::new("conf.py");
        let chunks = chunk_source(&path, "A = 1\nB = 2\n", &[]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].anchor_symbol, None);
        assert_eq!(chunks[0].line_range, LineRange { start: 1, end: 2 });
    }

    #[test]
    fn symbols_split_with_gap_chunks() {
        let path = FilePath::new("f.py");
        let content = "X = 1\n\ndef a():\n    pass\n\ndef b():\n    pass\n";
        let symbols = vec![sym("a", 3, 4), sym("b", 6, 7)];
        let chunks = chunk_source(&path, content, &symbols);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].anchor_symbol, None);
        assert!(chunks[0].text.contains("X = 1"));
        assert_eq!(chunks[1].anchor_symbol.as_deref(), Some("a"));
        assert_eq!(chunks[2].anchor_symbol.as_deref(), Some("b"));
    }

    #[test]
    fn nested_symbols_stay_inside_outer_chunk() {
        let path = FilePath::new("f.py");
        let content = "class C:\n    def m(self):\n        pass\n";
        let symbols = vec![
            Symbol {
                name: "C".to_string(),
                kind: SymbolKind::Class,
                line_range: LineRange { start: 1, end: 3 },
                qualified_name: "f.py:C".to_string(),
            },
            sym("C.m", 2, 3),
        ];
        let chunks = chunk_source(&path, content, &symbols);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].anchor_symbol.as_deref(), Some("C"));
    }

    #[test]
    fn chunk_id_is_stable() {
        let path = FilePath::new("a/b.rs");
        let chunks = chunk_source(&path, "fn x() {}\n", &[sym("x", 1, 1)]);
        assert_eq!(chunks[0].chunk_id(), "a/b.rs:1:1");
    }
}
