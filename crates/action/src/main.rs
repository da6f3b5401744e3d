mod config;
mod env;
mod error;
mod providers;

use crate::config::{build_ignore_set, load_config};
use crate::env::{mode_from_env, read_event, EventInfo, Secrets};
use crate::error::ActionError;
use crate::providers::{AnthropicProvider, OpenAiEmbeddingProvider};
use argus_core::{CommitSha, Mode, TokenBudget, TokenCount};
use argus_map::IndexingService;
use argus_memory::PatternAnalyzer;
use argus_parser::{LanguageTable, SourceParser};
use argus_retrieval::{AgentModel, EmbeddingProvider};
use argus_review::{
    git_head, GitHubPublisher, Pipeline, PipelineSettings, ReviewError, ReviewGenerator,
    ReviewPublisher,
};
use argus_store::{ArtifactStore, BranchSync, GitHubClient, MemoryStore};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Hard ceiling on a whole run; a stuck provider call must not wedge CI.
const RUN_DEADLINE: Duration = Duration::from_secs(15 * 60);

#[derive(Parser)]
#[command(name = "argus")]
#[command(about = "Context-aware automated pull request review", long_about = None)]
#[command(version)]
struct Cli {
    /// Operating mode (bootstrap, index, review); overrides ARGUS_MODE
    #[arg(long)]
    mode: Option<String>,

    /// Repository root (defaults to the current directory)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            let code = exit_code_for(&e);
            if code == 1 {
                log::error!("{e:#}");
            } else {
                log::error!("unhandled failure: {e:?}");
            }
            code
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .target(env_logger::Target::Stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mode: Mode = match cli.mode {
        Some(raw) => raw
            .parse()
            .map_err(|_| ActionError::Config(format!("invalid --mode {raw:?}")))?,
        None => mode_from_env()?,
    };
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    let secrets = Secrets::from_env()?;
    let config = load_config(mode, &root)?;
    let ignored = build_ignore_set(&config.ignored_paths)?;
    log::info!("argus {mode} for {} at {}", secrets.repository, root.display());

    let event = match &secrets.event_path {
        Some(path) => read_event(Path::new(path))?,
        None => EventInfo::default(),
    };

    let client = GitHubClient::new(&secrets.github_token, &secrets.repository);
    let storage_dir = root.join(&config.storage_dir);
    let artifacts = ArtifactStore::new(&storage_dir, &secrets.repository);
    let memory_store = MemoryStore::new(&storage_dir, &secrets.repository);
    let sync = BranchSync::new(client.clone(), artifacts.clone());

    let table = LanguageTable::with_extra(&config.extra_extensions);
    let indexing = IndexingService::new(SourceParser::new(table), ignored.clone());

    let api_key = secrets
        .llm_api_key
        .clone()
        .ok_or(ActionError::MissingEnv("ANTHROPIC_API_KEY"))?;
    let provider = Arc::new(AnthropicProvider::new(api_key, config.model.clone()));
    let generator: Arc<dyn ReviewGenerator> = provider.clone();
    let analyzer: Option<Arc<dyn PatternAnalyzer>> = Some(provider.clone());
    let publisher: Arc<dyn ReviewPublisher> = Arc::new(GitHubPublisher::new(client.clone()));

    let embedder: Option<Arc<dyn EmbeddingProvider>> =
        match (&config.embedding_model, &secrets.embedding_api_key) {
            (Some(model), Some(key)) => {
                Some(Arc::new(OpenAiEmbeddingProvider::new(key, model.clone())))
            }
            (Some(_), None) => {
                log::warn!("embedding_model set but no embedding API key; semantic disabled");
                None
            }
            _ => None,
        };
    let agent: Option<Arc<dyn AgentModel>> = if config.enable_agentic {
        Some(provider.clone())
    } else {
        None
    };

    let settings = PipelineSettings {
        repo_root: root.clone(),
        repo_id: secrets.repository.clone(),
        budget: TokenBudget::from_total(TokenCount(config.max_tokens)),
        depth: config.review_depth,
        confidence_threshold: config.confidence_threshold,
        ignored,
        enable_agentic: config.enable_agentic,
        embedding_model: config.embedding_model.clone(),
        enable_pr_context: config.enable_pr_context,
        search_related_issues: config.search_related_issues,
        analyze_patterns: config.analyze_patterns,
    };

    let mut pipeline = Pipeline::new(
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
    );

    let head = match &event.head_sha {
        Some(sha) => CommitSha::parse(sha.clone())
            .map_err(|e| ActionError::Event(format!("bad head sha in event: {e}")))?,
        None => git_head(&root).await?,
    };

    let work = async {
        match mode {
            Mode::Bootstrap => {
                pipeline.run_bootstrap(head).await?;
            }
            Mode::Index => {
                pipeline.run_index(head).await?;
            }
            Mode::Review => {
                let pr_number = event.pr_number.ok_or_else(|| {
                    ActionError::Event("review mode requires a pull_request event".into())
                })?;
                pipeline.run_review(pr_number).await?;
            }
        }
        Ok::<(), anyhow::Error>(())
    };

    match tokio::time::timeout(RUN_DEADLINE, work).await {
        Ok(result) => result,
        Err(_) => Err(ActionError::Deadline.into()),
    }
}

/// Exit codes: 0 success, 1 handled failure, 2 unhandled.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ActionError>().is_some() {
        return 1;
    }
    if let Some(review_err) = err.downcast_ref::<ReviewError>() {
        return match review_err {
            ReviewError::PromptTooLarge { .. } => 1,
            ReviewError::Store(store_err) if store_err.is_concurrent_write() => 1,
            _ => 2,
        };
    }
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_store::StoreError;

    #[test]
    fn handled_failures_exit_one() {
        let config: anyhow::Error = ActionError::Config("bad".into()).into();
        assert_eq!(exit_code_for(&config), 1);

        let too_large: anyhow::Error = ReviewError::PromptTooLarge {
            required: TokenCount(10),
            budget: TokenCount(5),
        }
        .into();
        assert_eq!(exit_code_for(&too_large), 1);

        let conflict: anyhow::Error = ReviewError::Store(StoreError::ConcurrentWrite {
            reference: "heads/argus-data".into(),
            expected: "abc".into(),
        })
        .into();
        assert_eq!(exit_code_for(&conflict), 1);
    }

    #[test]
    fn unexpected_failures_exit_two() {
        let other: anyhow::Error = ReviewError::Generation("model vanished".into()).into();
        assert_eq!(exit_code_for(&other), 2);
        let plain = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&plain), 2);
    }
}
