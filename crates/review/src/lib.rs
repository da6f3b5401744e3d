//! # Argus Review
//!
//! The top of the pipeline: diff parsing, prompt assembly under a strict
//! budget, the opaque review-generator port, noise filtering, publishing,
//! and the three mode pipelines (bootstrap, index, review) that glue the
//! map, stores, retrieval, and memory together.

mod context;
mod diff;
mod error;
mod generator;
mod noise;
mod output;
mod pipeline;
mod prompt;
mod publisher;

pub use context::{collect_pr_context, PrContext};
pub use diff::{changed_symbols, parse_unified_diff, DiffFile, DiffStatus};
pub use error::{Result, ReviewError};
pub use generator::ReviewGenerator;
pub use noise::NoiseFilter;
pub use output::{ReviewComment, ReviewOutput};
pub use pipeline::{
    git_changed_paths, git_diff_text, git_head, Pipeline, PipelineSettings, RunSummary,
};
pub use prompt::{assemble_prompt, render_patterns, render_retrieved, AssembledPrompt, PromptSections};
pub use publisher::{GitHubPublisher, ReviewPublisher};
