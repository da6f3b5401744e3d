//! Retrieval over a selectively-loaded partial map, end to end: indexer →
//! shards → partial load → strategies → ranker.

use argus_core::{CommitSha, FilePath, ReviewDepth, ShardId, TokenBudget, TokenCount};
use argus_map::IndexingService;
use argus_parser::{chunk_source, CodeChunk, LanguageTable, SourceParser};
use argus_retrieval::{
    LexicalStrategy, Ranker, RetrievalOrchestrator, RetrievalQuery, RetrievalStrategy,
    StrategyKind, StructuralStrategy,
};
use argus_store::{assemble_from_shards, selected_shards, split_into_shards};
use globset::GlobSet;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn sha(ch: char) -> CommitSha {
    CommitSha::parse(ch.to_string().repeat(40)).unwrap()
}

fn seed_repo(root: &Path) {
    fs::create_dir_all(root.join("a")).unwrap();
    fs::create_dir_all(root.join("b")).unwrap();
    fs::write(root.join("a/x.py"), "def f():\n    return 1\n").unwrap();
    fs::write(
        root.join("a/y.py"),
        "from b.z import g\n\ndef caller():\n    return g()\n",
    )
    .unwrap();
    fs::write(root.join("b/z.py"), "def g():\n    return 2\n").unwrap();
}

fn build_chunks(root: &Path, map: &argus_map::CodebaseMap) -> Vec<CodeChunk> {
    let mut chunks = Vec::new();
    for entry in map.entries() {
        let content = fs::read_to_string(root.join(entry.path.as_str())).unwrap();
        chunks.extend(chunk_source(&entry.path, &content, &entry.symbols));
    }
    chunks
}

fn query(budget_tokens: u32) -> RetrievalQuery {
    RetrievalQuery {
        changed_files: vec![FilePath::new("b/z.py")],
        changed_symbols: vec!["b/z.py:g".to_string()],
        diff_text: "+def g():\n+    return 3\n".to_string(),
        depth: ReviewDepth::Standard,
        budget: TokenBudget::from_total(TokenCount(budget_tokens)),
    }
}

#[tokio::test]
async fn structural_finds_dependents_through_a_partial_map() {
    let dir = TempDir::new().unwrap();
    seed_repo(dir.path());
    let service = IndexingService::new(SourceParser::new(LanguageTable::new()), GlobSet::empty());
    let full = service.full_build(dir.path(), sha('a')).unwrap();
    let (manifest, blobs) = split_into_shards(&full, None).unwrap();

    // Review path: the diff touches b/z.py; one hop pulls shard a too.
    let selected = selected_shards(&manifest, &[FilePath::new("b/z.py")]);
    let partial_jsons: BTreeMap<ShardId, String> = blobs
        .into_iter()
        .filter(|(sid, _)| selected.contains(sid))
        .collect();
    let partial = assemble_from_shards(&manifest, &partial_jsons).unwrap();

    let strategy = StructuralStrategy::new(Arc::new(partial));
    let items = strategy.retrieve(&query(100_000)).await.unwrap();

    // y.py is a dependent of g with full confidence.
    let dependent = items
        .iter()
        .find(|i| i.file_path.as_str() == "a/y.py")
        .expect("dependent of g not retrieved");
    assert_eq!(dependent.score, 1.0);
}

#[tokio::test]
async fn full_pass_respects_the_retrieval_budget() {
    let dir = TempDir::new().unwrap();
    seed_repo(dir.path());
    let service = IndexingService::new(SourceParser::new(LanguageTable::new()), GlobSet::empty());
    let map = service.full_build(dir.path(), sha('a')).unwrap();
    let chunks = build_chunks(dir.path(), &map);
    let map = Arc::new(map);

    let strategies: Vec<Box<dyn RetrievalStrategy>> = vec![
        Box::new(StructuralStrategy::new(map.clone())),
        Box::new(LexicalStrategy::new(chunks)),
    ];
    let orchestrator = RetrievalOrchestrator::new(strategies);

    // A tiny budget admits almost nothing and never overflows.
    let q = query(100);
    let report = orchestrator.retrieve(&q).await;
    assert!(report.result.tokens_used <= q.budget.retrieval);

    let total: u32 = report
        .result
        .items
        .iter()
        .map(|i| i.token_cost().get())
        .sum();
    assert!(TokenCount(total) <= q.budget.retrieval);
}

#[tokio::test]
async fn identical_inputs_give_identical_rankings() {
    let dir = TempDir::new().unwrap();
    seed_repo(dir.path());
    let service = IndexingService::new(SourceParser::new(LanguageTable::new()), GlobSet::empty());
    let map = service.full_build(dir.path(), sha('a')).unwrap();
    let chunks = build_chunks(dir.path(), &map);
    let map = Arc::new(map);

    let build = || -> RetrievalOrchestrator {
        RetrievalOrchestrator::new(vec![
            Box::new(StructuralStrategy::new(map.clone())) as Box<dyn RetrievalStrategy>,
            Box::new(LexicalStrategy::new(chunks.clone())),
        ])
    };

    let q = query(100_000);
    let first = build().retrieve(&q).await;
    let second = build().retrieve(&q).await;
    assert_eq!(first.result.items, second.result.items);
    assert_eq!(first.result.tokens_used, second.result.tokens_used);
}

#[test]
fn consensus_scenario_matches_the_scoring_rule() {
    use argus_retrieval::ContextItem;

    // Two strategies surface the same (file, range): 0.6 and 0.4 fuse to
    // 0.65; a lone 0.6 stays 0.60.
    let shared_a = ContextItem::new(
        StrategyKind::Structural,
        FilePath::new("a/y.py"),
        argus_core::LineRange { start: 3, end: 5 },
        "def caller(): ...".into(),
        0.6,
    );
    let shared_b = ContextItem::new(
        StrategyKind::Lexical,
        FilePath::new("a/y.py"),
        argus_core::LineRange { start: 3, end: 5 },
        "def caller(): ...".into(),
        0.4,
    );

    let budget = TokenBudget::from_total(TokenCount(100_000));
    let fused = Ranker::new().rank(vec![vec![shared_a.clone()], vec![shared_b]], &budget);
    assert!((fused.items[0].score - 0.65).abs() < 1e-9);

    let solo = Ranker::new().rank(vec![vec![shared_a]], &budget);
    assert!((solo.items[0].score - 0.60).abs() < 1e-9);
}
