//! Full-build coverage across several languages in one repository.

use argus_core::{CommitSha, EdgeKind, FilePath, SymbolKind};
use argus_map::IndexingService;
use argus_parser::{LanguageTable, SourceParser};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use tempfile::TempDir;

fn sha() -> CommitSha {
    CommitSha::parse("9".repeat(40)).unwrap()
}

#[test]
fn indexes_a_polyglot_repository() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("core")).unwrap();
    fs::create_dir_all(root.join("web")).unwrap();

    fs::write(
        root.join("core/engine.rs"),
        "pub struct Engine;\n\npub fn start() {\n    init();\n}\n\nfn init() {}\n",
    )
    .unwrap();
    fs::write(
        root.join("core/tasks.py"),
        "class Scheduler:\n    def run(self):\n        return tick()\n\ndef tick():\n    pass\n",
    )
    .unwrap();
    fs::write(
        root.join("web/app.ts"),
        "import { Engine } from \"../core/engine\";\n\nexport class App {\n  boot(): void {}\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("web/server.go"),
        "package web\n\nimport \"fmt\"\n\nfunc Serve() {\n\tfmt.Println(\"up\")\n}\n",
    )
    .unwrap();
    // Not a source file; must be skipped, not fail the build.
    fs::write(root.join("README.md"), "# sample\n").unwrap();

    let service = IndexingService::new(SourceParser::new(LanguageTable::new()), GlobSet::empty());
    let map = service.full_build(root, sha()).unwrap();

    assert_eq!(map.len(), 4);

    let engine = map.get(&FilePath::new("core/engine.rs")).unwrap();
    assert_eq!(engine.language, "rust");
    assert!(engine
        .symbols
        .iter()
        .any(|s| s.name == "Engine" && s.kind == SymbolKind::Struct));

    let tasks = map.get(&FilePath::new("core/tasks.py")).unwrap();
    assert!(tasks.symbols.iter().any(|s| s.name == "Scheduler.run"));

    let app = map.get(&FilePath::new("web/app.ts")).unwrap();
    assert_eq!(app.language, "typescript");

    let server = map.get(&FilePath::new("web/server.go")).unwrap();
    assert!(server.symbols.iter().any(|s| s.name == "Serve"));

    // The rust-internal call was linked to a qualified symbol.
    assert!(map
        .graph
        .edges()
        .any(|e| e.source == "core/engine.rs:start"
            && e.kind == EdgeKind::Calls
            && e.target == "core/engine.rs:init"));
}

#[test]
fn ignored_globs_exclude_files_from_indexing() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("vendor")).unwrap();
    fs::write(root.join("app.py"), "def main():\n    pass\n").unwrap();
    fs::write(root.join("vendor/lib.py"), "def vendored():\n    pass\n").unwrap();

    let mut builder = GlobSetBuilder::new();
    builder.add(Glob::new("vendor/**").unwrap());
    let ignored = builder.build().unwrap();

    let service = IndexingService::new(SourceParser::new(LanguageTable::new()), ignored);
    let map = service.full_build(root, sha()).unwrap();

    assert!(map.contains(&FilePath::new("app.py")));
    assert!(!map.contains(&FilePath::new("vendor/lib.py")));
}

#[test]
fn broken_source_degrades_without_poisoning_the_map() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::write(root.join("good.py"), "def ok():\n    pass\n").unwrap();
    // Invalid UTF-8 bytes; the parser still produces a tree or the file
    // degrades — either way the build survives and good.py is intact.
    fs::write(root.join("weird.py"), [0xff, 0xfe, 0x00, 0x41]).unwrap();

    let service = IndexingService::new(SourceParser::new(LanguageTable::new()), GlobSet::empty());
    let map = service.full_build(root, sha()).unwrap();

    assert!(map.contains(&FilePath::new("good.py")));
    assert!(map.contains(&FilePath::new("weird.py")));
    assert!(map
        .get(&FilePath::new("good.py"))
        .unwrap()
        .symbols
        .iter()
        .any(|s| s.name == "ok"));
}
