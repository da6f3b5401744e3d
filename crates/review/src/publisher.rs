use crate::error::{Result, ReviewError};
use crate::output::ReviewOutput;
use argus_core::Severity;
use argus_store::{GitHubClient, ReviewCommentPayload};
use async_trait::async_trait;

/// Port for publishing a finished review.
#[async_trait]
pub trait ReviewPublisher: Send + Sync {
    async fn publish(&self, pr_number: u64, review: &ReviewOutput) -> Result<()>;
}

/// Publishes to GitHub as a PR review with inline comments.
pub struct GitHubPublisher {
    client: GitHubClient,
}

impl GitHubPublisher {
    pub fn new(client: GitHubClient) -> Self {
        GitHubPublisher { client }
    }
}

#[async_trait]
impl ReviewPublisher for GitHubPublisher {
    async fn publish(&self, pr_number: u64, review: &ReviewOutput) -> Result<()> {
        let comments: Vec<ReviewCommentPayload> = review
            .comments
            .iter()
            .map(|c| ReviewCommentPayload {
                path: c.path.to_string(),
                line: c.line,
                body: format!("{} **{:?}/{:?}**: {}", marker(c.severity), c.severity, c.category, c.message),
            })
            .collect();

        let body = if review.comments.is_empty() {
            format!("{}\n\nNo findings.", review.summary)
        } else {
            review.summary.clone()
        };

        self.client
            .post_review(pr_number, &body, &comments)
            .await
            .map_err(|e| ReviewError::Publish(e.to_string()))
    }
}

fn marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴",
        Severity::Warning => "🟡",
        Severity::Suggestion => "🔵",
        Severity::Praise => "🟢",
    }
}
