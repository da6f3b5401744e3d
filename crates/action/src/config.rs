use crate::error::ActionError;
use argus_core::{Mode, ReviewDepth};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE: &str = "argus.toml";

const REVIEW_DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const INDEX_DEFAULT_MODEL: &str = "claude-haiku-4-5";
const REVIEW_DEFAULT_MAX_TOKENS: u32 = 128_000;
const INDEX_DEFAULT_MAX_TOKENS: u32 = 200_000;

/// Typed configuration for one run, after defaults and the mode overlay.
#[derive(Debug, Clone)]
pub struct ArgusConfig {
    pub model: String,
    pub max_tokens: u32,
    pub storage_dir: String,
    pub embedding_model: Option<String>,
    pub search_related_issues: bool,
    pub confidence_threshold: f64,
    pub review_depth: ReviewDepth,
    pub ignored_paths: Vec<String>,
    pub enable_agentic: bool,
    pub extra_extensions: Vec<String>,
    pub enable_pr_context: bool,
    pub analyze_patterns: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    model: Option<String>,
    max_tokens: Option<u32>,
    storage_dir: Option<String>,
    embedding_model: Option<String>,
    search_related_issues: Option<bool>,
    confidence_threshold: Option<f64>,
    review_depth: Option<String>,
    ignored_paths: Option<Vec<String>>,
    enable_agentic: Option<bool>,
    extra_extensions: Option<Vec<String>>,
    enable_pr_context: Option<bool>,
    index: Option<RawIndexOverlay>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawIndexOverlay {
    model: Option<String>,
    max_tokens: Option<u32>,
    analyze_patterns: Option<bool>,
}

const KNOWN_KEYS: [&str; 12] = [
    "model",
    "max_tokens",
    "storage_dir",
    "embedding_model",
    "search_related_issues",
    "confidence_threshold",
    "review_depth",
    "ignored_paths",
    "enable_agentic",
    "extra_extensions",
    "enable_pr_context",
    "index",
];

/// Load `argus.toml` from the working tree. A missing file means all
/// defaults apply; a malformed file or out-of-range value fails the run.
///
/// The `[index]` overlay applies only in index and bootstrap modes, so a
/// cheaper model can do the background work.
pub fn load_config(mode: Mode, root: &Path) -> Result<ArgusConfig, ActionError> {
    let path = root.join(CONFIG_FILE);
    let raw: RawConfig = if path.exists() {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ActionError::Config(format!("cannot read {CONFIG_FILE}: {e}")))?;
        warn_unknown_keys(&text);
        toml::from_str(&text)
            .map_err(|e| ActionError::Config(format!("invalid {CONFIG_FILE}: {e}")))?
    } else {
        RawConfig::default()
    };

    let is_index_mode = matches!(mode, Mode::Index | Mode::Bootstrap);
    let overlay = raw.index.clone().unwrap_or_default();

    let mut model = raw.model.unwrap_or_else(|| default_model(is_index_mode).to_string());
    let mut max_tokens = raw
        .max_tokens
        .unwrap_or(if is_index_mode { INDEX_DEFAULT_MAX_TOKENS } else { REVIEW_DEFAULT_MAX_TOKENS });
    let mut analyze_patterns = false;

    if is_index_mode {
        if let Some(m) = overlay.model {
            model = m;
        }
        if let Some(t) = overlay.max_tokens {
            max_tokens = t;
        }
        analyze_patterns = overlay.analyze_patterns.unwrap_or(false);
    }

    let confidence_threshold = raw.confidence_threshold.unwrap_or(0.7);
    if !(0.0..=1.0).contains(&confidence_threshold) {
        return Err(ActionError::Config(format!(
            "confidence_threshold must be in [0, 1], got {confidence_threshold}"
        )));
    }
    if max_tokens == 0 {
        return Err(ActionError::Config("max_tokens must be positive".into()));
    }

    let review_depth = match raw.review_depth.as_deref() {
        None => ReviewDepth::Standard,
        Some(s) => s
            .parse()
            .map_err(|_| ActionError::Config(format!("invalid review_depth {s:?}")))?,
    };

    let embedding_model = raw.embedding_model.filter(|m| !m.trim().is_empty());

    Ok(ArgusConfig {
        model,
        max_tokens,
        storage_dir: raw.storage_dir.unwrap_or_else(|| ".argus-artifacts".to_string()),
        embedding_model,
        search_related_issues: raw.search_related_issues.unwrap_or(false),
        confidence_threshold,
        review_depth,
        ignored_paths: raw.ignored_paths.unwrap_or_default(),
        enable_agentic: raw.enable_agentic.unwrap_or(false),
        extra_extensions: raw.extra_extensions.unwrap_or_default(),
        enable_pr_context: raw.enable_pr_context.unwrap_or(true),
        analyze_patterns,
    })
}

/// Compile the ignored-path globs; applied at indexing and publishing.
pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet, ActionError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ActionError::Config(format!("bad ignored_paths glob {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ActionError::Config(e.to_string()))
}

fn default_model(is_index_mode: bool) -> &'static str {
    if is_index_mode {
        INDEX_DEFAULT_MODEL
    } else {
        REVIEW_DEFAULT_MODEL
    }
}

fn warn_unknown_keys(text: &str) {
    let Ok(value) = text.parse::<toml::Value>() else {
        return;
    };
    let Some(table) = value.as_table() else { return };
    for key in table.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            log::warn!("unknown key {key:?} in {CONFIG_FILE}, ignoring");
        }
    }
}
