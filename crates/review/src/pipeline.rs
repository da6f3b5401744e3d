use crate::context::collect_pr_context;
use crate::diff::{changed_symbols, parse_unified_diff};
use crate::error::{Result, ReviewError};
use crate::generator::ReviewGenerator;
use crate::noise::NoiseFilter;
use crate::prompt::{assemble_prompt, render_patterns, render_retrieved, PromptSections};
use crate::publisher::ReviewPublisher;
use argus_core::{CommitSha, FilePath, Mode, ReviewDepth, ShardId, TokenBudget, TokenCount};
use argus_map::{CodebaseMap, FileChange, IndexingService};
use argus_memory::{CodebaseMemory, OutlineRenderer, OutlineScope, PatternAnalyzer, ProfileService};
use argus_parser::{chunk_source, CodeChunk};
use argus_retrieval::{
    AgentModel, AgenticStrategy, EmbeddingProvider, LexicalStrategy, RetrievalOrchestrator,
    RetrievalQuery, RetrievalStrategy, SemanticStrategy, StrategyCount, StructuralStrategy,
    ToolBox,
};
use argus_store::{
    embedding_blob_name, ArtifactStore, BranchSync, EmbeddingIndex, GitHubClient, MemoryStore,
    PullOutcome, SaveReport,
};
use globset::GlobSet;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Everything a run needs to know, resolved from config and environment.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub repo_root: std::path::PathBuf,
    pub repo_id: String,
    pub budget: TokenBudget,
    pub depth: ReviewDepth,
    pub confidence_threshold: f64,
    pub ignored: GlobSet,
    pub enable_agentic: bool,
    pub embedding_model: Option<String>,
    pub enable_pr_context: bool,
    pub search_related_issues: bool,
    pub analyze_patterns: bool,
}

/// The summary every run logs exactly once before exiting.
#[derive(Debug)]
pub struct RunSummary {
    pub mode: Mode,
    pub verdict: &'static str,
    pub indexed_at: Option<CommitSha>,
    pub analyzed_at: Option<CommitSha>,
    pub shards_pulled: usize,
    pub shards_pushed: usize,
    pub strategy_counts: Vec<StrategyCount>,
    pub tokens_used: TokenCount,
    pub comments_published: usize,
}

impl RunSummary {
    pub fn log(&self) {
        let strategies: Vec<String> = self
            .strategy_counts
            .iter()
            .map(|c| format!("{}={}", c.kind, c.items))
            .collect();
        log::info!(
            "run complete: mode={} verdict={} indexed_at={} analyzed_at={} \
             shards_pulled={} shards_pushed={} retrieved=[{}] tokens={} comments={}",
            self.mode,
            self.verdict,
            self.indexed_at.as_ref().map(|s| s.short()).unwrap_or("-"),
            self.analyzed_at.as_ref().map(|s| s.short()).unwrap_or("-"),
            self.shards_pulled,
            self.shards_pushed,
            strategies.join(","),
            self.tokens_used,
            self.comments_published,
        );
    }
}

/// Wires map building, the stores, retrieval, memory, and publishing into
/// the three run modes.
pub struct Pipeline {
    settings: PipelineSettings,
    client: GitHubClient,
    sync: BranchSync,
    artifacts: ArtifactStore,
    memory_store: MemoryStore,
    indexing: IndexingService,
    generator: Arc<dyn ReviewGenerator>,
    publisher: Arc<dyn ReviewPublisher>,
    analyzer: Option<Arc<dyn PatternAnalyzer>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    agent: Option<Arc<dyn AgentModel>>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: PipelineSettings,
        client: GitHubClient,
        sync: BranchSync,
        artifacts: ArtifactStore,
        memory_store: MemoryStore,
        indexing: IndexingService,
        generator: Arc<dyn ReviewGenerator>,
        publisher: Arc<dyn ReviewPublisher>,
        analyzer: Option<Arc<dyn PatternAnalyzer>>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        agent: Option<Arc<dyn AgentModel>>,
    ) -> Self {
        Pipeline {
            settings,
            client,
            sync,
            artifacts,
            memory_store,
            indexing,
            generator,
            publisher,
            analyzer,
            embedder,
            agent,
        }
    }

    // ------------------------------------------------------------------
    // Bootstrap: full build + analysis + push
    // ------------------------------------------------------------------

    pub async fn run_bootstrap(&mut self, head: CommitSha) -> Result<RunSummary> {
        match self.bootstrap_once(head.clone()).await {
            Err(ReviewError::Store(e)) if e.is_concurrent_write() => {
                log::warn!("bootstrap push lost the ref race, retrying once");
                self.bootstrap_once(head).await
            }
            other => other,
        }
    }

    async fn bootstrap_once(&mut self, head: CommitSha) -> Result<RunSummary> {
        let outcome = self.sync.pull_manifest().await?;
        let prior_manifest = match outcome {
            PullOutcome::Sharded(manifest) => Some(manifest),
            _ => None,
        };

        let map = self
            .indexing
            .full_build(&self.settings.repo_root, head.clone())?;
        let save = self.artifacts.save_map(&map, prior_manifest.as_ref()).await?;

        let mut extra_blobs: Vec<String> = Vec::new();
        let mut analyzed_at: Option<CommitSha> = None;

        if let Some(analyzer) = &self.analyzer {
            let existing = self.load_memory().await?;

            // Incremental diff base after index-only runs: analyzed_at,
            // falling back to indexed_at — never just indexed_at.
            let base = existing
                .as_ref()
                .and_then(|m| m.analyzed_at.clone())
                .or_else(|| prior_manifest.as_ref().map(|m| m.indexed_at.clone()));
            let diff_text = match &base {
                Some(b) if b != &head => {
                    git_diff_text(&self.settings.repo_root, b, &head).await.unwrap_or_default()
                }
                _ => String::new(),
            };

            let (text, outline) = self.outline_renderer().render(&map, &OutlineScope::Full);
            let profile = ProfileService::new(analyzer.clone());
            let memory = profile
                .bootstrap(existing, outline, &text, &diff_text, head.clone())
                .await?;
            analyzed_at = memory.analyzed_at.clone();
            self.memory_store.save(&memory).await?;
            extra_blobs.push(self.memory_store.blob_name());
        }

        extra_blobs.extend(self.compute_embeddings(&map).await?);

        let shards_pushed = save.written.len();
        self.push_save(&save, extra_blobs, &format!("argus: bootstrap at {}", head.short()))
            .await?;

        let summary = RunSummary {
            mode: Mode::Bootstrap,
            verdict: "ok",
            indexed_at: Some(map.indexed_at.clone()),
            analyzed_at,
            shards_pulled: 0,
            shards_pushed,
            strategy_counts: Vec::new(),
            tokens_used: TokenCount::ZERO,
            comments_published: 0,
        };
        summary.log();
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Index: incremental build + optional analysis + push
    // ------------------------------------------------------------------

    pub async fn run_index(&mut self, head: CommitSha) -> Result<RunSummary> {
        match self.index_once(head.clone()).await {
            Err(ReviewError::Store(e)) if e.is_concurrent_write() => {
                // Someone pushed first. Re-pull, recompute dirty shards
                // against the new manifest, and retry exactly once.
                log::warn!("index push lost the ref race, re-pulling and retrying once");
                self.index_once(head).await
            }
            other => other,
        }
    }

    async fn index_once(&mut self, head: CommitSha) -> Result<RunSummary> {
        let outcome = self.sync.pull_manifest().await?;

        let (map, save, changed, shards_pulled) = match outcome {
            PullOutcome::Empty => {
                let map = self
                    .indexing
                    .full_build(&self.settings.repo_root, head.clone())?;
                let save = self.artifacts.save_map(&map, None).await?;
                (map, save, None, 0)
            }
            PullOutcome::Legacy(prior_map) => {
                let changed =
                    git_changed_paths(&self.settings.repo_root, &prior_map.indexed_at, &head)
                        .await?;
                let changes = self.file_changes(&changed).await;
                let map = self.indexing.incremental(*prior_map, &changes, head.clone())?;
                // No prior manifest: the legacy blob is superseded wholesale.
                let save = self.artifacts.save_map(&map, None).await?;
                (map, save, Some(changed), 0)
            }
            PullOutcome::Sharded(manifest) => {
                let changed =
                    git_changed_paths(&self.settings.repo_root, &manifest.indexed_at, &head)
                        .await?;
                if changed.is_empty() {
                    log::info!("index: no changes since {}", manifest.indexed_at.short());
                    let summary = RunSummary {
                        mode: Mode::Index,
                        verdict: "up-to-date",
                        indexed_at: Some(manifest.indexed_at.clone()),
                        analyzed_at: None,
                        shards_pulled: 0,
                        shards_pushed: 0,
                        strategy_counts: Vec::new(),
                        tokens_used: TokenCount::ZERO,
                        comments_published: 0,
                    };
                    summary.log();
                    return Ok(summary);
                }

                let dirty = manifest.dirty_shards(&changed);
                let partial = self.sync.pull_shards(&manifest, dirty.iter().cloned()).await?;
                let pulled = dirty.len();

                let changes = self.file_changes(&changed).await;
                let removed: Vec<FilePath> = changes
                    .iter()
                    .filter_map(|c| match c {
                        FileChange::Remove { path } => Some(path.clone()),
                        FileChange::Upsert { .. } => None,
                    })
                    .collect();

                let updated = self.indexing.incremental(partial, &changes, head.clone())?;
                let save = self
                    .artifacts
                    .save_map_incremental(&updated, &manifest, &dirty, &removed)
                    .await?;
                (updated, save, Some(changed), pulled)
            }
        };

        let mut extra_blobs: Vec<String> = Vec::new();
        let mut analyzed_at: Option<CommitSha> = None;

        if self.settings.analyze_patterns {
            if let Some(analyzer) = &self.analyzer {
                let existing = self.load_memory().await?.unwrap_or_default();
                let profile = ProfileService::new(analyzer.clone());

                let memory = match &changed {
                    Some(changed_paths) => {
                        // Scoped outline feeds the LLM only; the stored
                        // outline stays as persisted.
                        let scope = OutlineScope::Scoped(changed_paths.clone());
                        let (text, _) = self.outline_renderer().render(&map, &scope);
                        let diff_base = existing
                            .analyzed_at
                            .clone()
                            .unwrap_or_else(|| map.indexed_at.clone());
                        let diff_text = git_diff_text(&self.settings.repo_root, &diff_base, &head)
                            .await
                            .unwrap_or_default();
                        profile.incremental(existing, &text, &diff_text, head.clone()).await?
                    }
                    None => {
                        let (text, outline) =
                            self.outline_renderer().render(&map, &OutlineScope::Full);
                        profile
                            .bootstrap(Some(existing), outline, &text, "", head.clone())
                            .await?
                    }
                };
                analyzed_at = memory.analyzed_at.clone();
                self.memory_store.save(&memory).await?;
                extra_blobs.push(self.memory_store.blob_name());
            }
        }

        extra_blobs.extend(self.compute_embeddings(&map).await?);

        let shards_pushed = save.written.len();
        self.push_save(&save, extra_blobs, &format!("argus: index at {}", head.short()))
            .await?;

        let summary = RunSummary {
            mode: Mode::Index,
            verdict: "ok",
            indexed_at: Some(head),
            analyzed_at,
            shards_pulled,
            shards_pushed,
            strategy_counts: Vec::new(),
            tokens_used: TokenCount::ZERO,
            comments_published: 0,
        };
        summary.log();
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Review: selective pull + retrieve + generate + publish
    // ------------------------------------------------------------------

    pub async fn run_review(&mut self, pr_number: u64) -> Result<RunSummary> {
        let pull = self.client.get_pull(pr_number).await?;
        let head = CommitSha::parse(pull.head_sha.as_str())
            .map_err(|e| ReviewError::GitProbe(format!("bad head sha: {e}")))?;
        let diff_text = self.client.get_pull_diff(pr_number).await?;

        let diff_files: Vec<_> = parse_unified_diff(&diff_text)
            .into_iter()
            .filter(|f| !self.settings.ignored.is_match(f.path.as_str()))
            .collect();
        let required: Vec<FilePath> = diff_files.iter().map(|f| f.path.clone()).collect();

        let (_manifest, loaded) = self.sync.pull_for_review(&required).await?;
        let map = loaded.unwrap_or_else(|| CodebaseMap::new(head.clone()));
        let shards_pulled = map
            .files()
            .map(|p| p.shard_id())
            .collect::<BTreeSet<ShardId>>()
            .len();

        let symbols = changed_symbols(&map, &diff_files);
        let query = RetrievalQuery {
            changed_files: required.clone(),
            changed_symbols: symbols,
            diff_text: diff_text.clone(),
            depth: self.settings.depth,
            budget: self.settings.budget,
        };

        let map = Arc::new(map);
        let chunks = self.build_chunks(&map).await;
        let strategies = self.build_strategies(map.clone(), chunks).await;
        let orchestrator = RetrievalOrchestrator::new(strategies);
        let report = orchestrator.retrieve(&query).await;

        // Memory per review depth: quick loads nothing.
        let memory = match self.settings.depth {
            ReviewDepth::Quick => None,
            ReviewDepth::Standard | ReviewDepth::Deep => self.load_memory().await?,
        };
        let analyzed_at = memory.as_ref().and_then(|m| m.analyzed_at.clone());

        let outline_text = match self.settings.depth {
            ReviewDepth::Quick => None,
            _ => {
                let scope = OutlineScope::Scoped(required.clone());
                let (text, _) = self.outline_renderer().render(&map, &scope);
                (!text.is_empty()).then_some(text)
            }
        };
        let patterns_text = match (&memory, self.settings.depth) {
            (Some(memory), ReviewDepth::Deep) => render_patterns(&memory.patterns),
            _ => None,
        };

        let pr_context = if self.settings.enable_pr_context {
            match collect_pr_context(
                &self.client,
                pr_number,
                self.settings.search_related_issues,
            )
            .await
            {
                Ok(context) => Some(context.render()),
                Err(e) => {
                    log::warn!("PR context collection failed, continuing without: {e}");
                    None
                }
            }
        } else {
            None
        };

        let prompt = assemble_prompt(
            PromptSections {
                diff: diff_text,
                pr_context,
                retrieved: render_retrieved(&report.result),
                outline: outline_text,
                patterns: patterns_text,
            },
            &self.settings.budget,
        )?;

        let output = self.generator.generate(&prompt.text).await?;
        let filter = NoiseFilter::new(
            self.settings.confidence_threshold,
            self.settings.ignored.clone(),
        );
        let filtered = crate::output::ReviewOutput {
            summary: output.summary,
            comments: filter.filter(output.comments),
        };

        self.publisher.publish(pr_number, &filtered).await?;

        let summary = RunSummary {
            mode: Mode::Review,
            verdict: "ok",
            indexed_at: Some(map.indexed_at.clone()),
            analyzed_at,
            shards_pulled,
            shards_pushed: 0,
            strategy_counts: report.counts,
            tokens_used: prompt.tokens,
            comments_published: filtered.comments.len(),
        };
        summary.log();
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    fn outline_renderer(&self) -> OutlineRenderer {
        // Four chars per token, same as every budget estimate.
        OutlineRenderer::new(self.settings.budget.outline.get() as usize * 4)
    }

    async fn load_memory(&self) -> Result<Option<CodebaseMemory>> {
        let name = self.memory_store.blob_name();
        let _ = self.sync.pull_optional_blob(&name).await?;
        Ok(self.memory_store.load().await?)
    }

    async fn file_changes(&self, changed: &[FilePath]) -> Vec<FileChange> {
        let mut changes = Vec::new();
        for path in changed {
            if self.settings.ignored.is_match(path.as_str()) {
                continue;
            }
            let full = self.settings.repo_root.join(path.as_str());
            match tokio::fs::read(&full).await {
                Ok(content) => changes.push(FileChange::Upsert {
                    path: path.clone(),
                    content,
                }),
                Err(_) => changes.push(FileChange::Remove { path: path.clone() }),
            }
        }
        changes
    }

    async fn build_chunks(&self, map: &CodebaseMap) -> Vec<CodeChunk> {
        let mut chunks = Vec::new();
        for entry in map.entries() {
            let full = self.settings.repo_root.join(entry.path.as_str());
            let Ok(content) = tokio::fs::read_to_string(&full).await else {
                continue;
            };
            chunks.extend(chunk_source(&entry.path, &content, &entry.symbols));
        }
        chunks
    }

    async fn build_strategies(
        &self,
        map: Arc<CodebaseMap>,
        chunks: Vec<CodeChunk>,
    ) -> Vec<Box<dyn RetrievalStrategy>> {
        let mut strategies: Vec<Box<dyn RetrievalStrategy>> =
            vec![Box::new(StructuralStrategy::new(map.clone()))];
        strategies.push(Box::new(LexicalStrategy::new(chunks.clone())));

        if let (Some(model), Some(embedder)) = (&self.settings.embedding_model, &self.embedder) {
            let shard_ids: BTreeSet<ShardId> = map.files().map(|p| p.shard_id()).collect();
            for sid in &shard_ids {
                let name = embedding_blob_name(sid, model);
                if let Err(e) = self.sync.pull_optional_blob(&name).await {
                    log::warn!("embedding blob fetch failed for {sid}: {e}");
                }
            }
            match self
                .artifacts
                .load_embedding_indices(shard_ids.iter(), model)
                .await
            {
                Ok(indices) if !indices.is_empty() => {
                    strategies.push(Box::new(SemanticStrategy::new(
                        embedder.clone(),
                        indices,
                        chunks.clone(),
                    )));
                }
                Ok(_) => log::info!("no stored embeddings for the loaded shards"),
                Err(e) => log::warn!("embedding indices unreadable, skipping semantic: {e}"),
            }
        }

        if self.settings.enable_agentic {
            if let Some(agent) = &self.agent {
                let tools = ToolBox::new(
                    map,
                    chunks,
                    Some(self.settings.repo_root.clone()),
                );
                strategies.push(Box::new(AgenticStrategy::new(agent.clone(), tools)));
            }
        }

        strategies
    }

    /// Recompute and persist per-shard embeddings for the entries of `map`.
    /// A provider failure degrades to "no embeddings this run".
    async fn compute_embeddings(&self, map: &CodebaseMap) -> Result<Vec<String>> {
        let (Some(model), Some(embedder)) = (&self.settings.embedding_model, &self.embedder)
        else {
            return Ok(Vec::new());
        };

        let chunks = self.build_chunks(map).await;
        let mut by_shard: BTreeMap<ShardId, Vec<CodeChunk>> = BTreeMap::new();
        for chunk in chunks {
            by_shard.entry(chunk.file_path.shard_id()).or_default().push(chunk);
        }

        let mut names = Vec::new();
        for (shard_id, shard_chunks) in by_shard {
            let texts: Vec<String> = shard_chunks.iter().map(|c| c.text.clone()).collect();
            match embedder.embed(&texts).await {
                Ok(vectors) if vectors.len() == shard_chunks.len() => {
                    let index = EmbeddingIndex {
                        shard_id,
                        model: model.clone(),
                        dimension: vectors.first().map(Vec::len).unwrap_or(0),
                        chunk_ids: shard_chunks.iter().map(|c| c.chunk_id()).collect(),
                        vectors,
                    };
                    names.push(self.artifacts.save_embedding_index(&index).await?);
                }
                Ok(_) => log::warn!("embedding count mismatch for shard {shard_id}, skipping"),
                Err(e) => {
                    log::warn!("embedding provider failed, skipping remaining shards: {e}");
                    break;
                }
            }
        }
        Ok(names)
    }

    async fn push_save(
        &mut self,
        save: &SaveReport,
        extra_blobs: Vec<String>,
        message: &str,
    ) -> Result<()> {
        let mut blobs: Vec<(String, Vec<u8>)> = Vec::new();
        for name in save.written.iter().chain(extra_blobs.iter()) {
            match self.artifacts.read_blob(name).await? {
                Some(bytes) => blobs.push((name.clone(), bytes)),
                None => {
                    return Err(argus_store::StoreError::MissingBlob(name.clone()).into());
                }
            }
        }
        self.sync
            .push(blobs, save.orphaned.clone(), message)
            .await?;
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Local git probes
// ----------------------------------------------------------------------

/// Current HEAD of the working tree.
pub async fn git_head(root: &Path) -> Result<CommitSha> {
    let out = run_git(root, &["rev-parse", "HEAD"]).await?;
    CommitSha::parse(out.trim()).map_err(|e| ReviewError::GitProbe(e.to_string()))
}

/// Paths changed between two commits, renames counted on both sides.
pub async fn git_changed_paths(root: &Path, old: &CommitSha, new: &CommitSha) -> Result<Vec<FilePath>> {
    if old == new {
        return Ok(Vec::new());
    }
    let out = run_git(
        root,
        &["diff", "--name-only", "-z", old.as_str(), new.as_str()],
    )
    .await?;
    Ok(out
        .split('\0')
        .filter(|s| !s.is_empty())
        .map(FilePath::new)
        .collect())
}

/// Unified diff text between two commits.
pub async fn git_diff_text(root: &Path, old: &CommitSha, new: &CommitSha) -> Result<String> {
    if old == new {
        return Ok(String::new());
    }
    run_git(root, &["diff", old.as_str(), new.as_str()]).await
}

async fn run_git(root: &Path, args: &[&str]) -> Result<String> {
    let output = tokio::process::Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .output()
        .await
        .map_err(|e| ReviewError::GitProbe(e.to_string()))?;
    if !output.status.success() {
        return Err(ReviewError::GitProbe(format!(
            "git {} exited with {}",
            args.first().unwrap_or(&""),
            output.status,
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
