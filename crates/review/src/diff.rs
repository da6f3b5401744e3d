use argus_core::{FilePath, LineRange};
use argus_map::CodebaseMap;
use regex::Regex;
use std::sync::OnceLock;

/// How the diff touched a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    Added,
    Modified,
    Removed,
}

/// One file's slice of a unified diff: status plus new-side hunk ranges.
#[derive(Debug, Clone)]
pub struct DiffFile {
    pub path: FilePath,
    pub status: DiffStatus,
    pub hunks: Vec<LineRange>,
}

fn hunk_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").unwrap())
}

/// Parse a unified diff into per-file changes.
///
/// Hunk ranges are in new-file coordinates; a removed file has none.
pub fn parse_unified_diff(diff: &str) -> Vec<DiffFile> {
    let mut files: Vec<DiffFile> = Vec::new();

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git a/") {
            // `a/<old> b/<new>`: the new-side path names the file.
            let new_path = rest.split(" b/").nth(1).unwrap_or(rest);
            files.push(DiffFile {
                path: FilePath::new(new_path),
                status: DiffStatus::Modified,
                hunks: Vec::new(),
            });
        } else if line.starts_with("--- /dev/null") {
            if let Some(current) = files.last_mut() {
                current.status = DiffStatus::Added;
            }
        } else if line.starts_with("+++ /dev/null") {
            if let Some(current) = files.last_mut() {
                current.status = DiffStatus::Removed;
            }
        } else if let Some(captures) = hunk_header().captures(line) {
            if let Some(current) = files.last_mut() {
                let start: u32 = captures[1].parse().unwrap_or(1);
                let count: u32 = captures
                    .get(2)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(1);
                let end = start + count.saturating_sub(1);
                current.hunks.push(LineRange {
                    start: start.max(1),
                    end: end.max(start.max(1)),
                });
            }
        }
    }

    files
}

/// Qualified names of the symbols the diff touched: symbols whose line
/// range overlaps a hunk. A file with no parsed hunks contributes all its
/// symbols — better too much structural seed than none.
pub fn changed_symbols(map: &CodebaseMap, files: &[DiffFile]) -> Vec<String> {
    let mut symbols = Vec::new();
    for file in files {
        if file.status == DiffStatus::Removed {
            continue;
        }
        let Some(entry) = map.get(&file.path) else { continue };
        for symbol in &entry.symbols {
            let touched = file.hunks.is_empty()
                || file.hunks.iter().any(|h| h.overlaps(&symbol.line_range));
            if touched {
                symbols.push(symbol.qualified_name.clone());
            }
        }
    }
    symbols
}
