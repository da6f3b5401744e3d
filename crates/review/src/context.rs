use crate::error::Result;
use argus_store::GitHubClient;

/// Pull-request metadata rendered into the "PR context" prompt section.
#[derive(Debug, Clone, Default)]
pub struct PrContext {
    pub title: String,
    pub body: String,
    pub commit_messages: Vec<String>,
    pub related_issues: Vec<(u64, String)>,
}

impl PrContext {
    pub fn render(&self) -> String {
        let mut out = format!("Title: {}\n", self.title);
        if !self.body.is_empty() {
            out.push_str(&format!("Description:\n{}\n", self.body));
        }
        if !self.commit_messages.is_empty() {
            out.push_str("Commits:\n");
            for message in &self.commit_messages {
                let first_line = message.lines().next().unwrap_or_default();
                out.push_str(&format!("- {first_line}\n"));
            }
        }
        if !self.related_issues.is_empty() {
            out.push_str("Related issues:\n");
            for (number, title) in &self.related_issues {
                out.push_str(&format!("- #{number}: {title}\n"));
            }
        }
        out
    }
}

/// Collect PR title, body, and commit messages; optionally search for
/// related issues using the PR title as the query.
pub async fn collect_pr_context(
    client: &GitHubClient,
    pr_number: u64,
    search_related_issues: bool,
) -> Result<PrContext> {
    let pull = client.get_pull(pr_number).await?;
    let commit_messages = client.list_pull_commit_messages(pr_number).await?;

    let related_issues = if search_related_issues {
        match client.search_issues(&pull.title).await {
            Ok(issues) => issues.into_iter().map(|i| (i.number, i.title)).collect(),
            Err(e) => {
                log::warn!("issue search failed, continuing without: {e}");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    Ok(PrContext {
        title: pull.title,
        body: pull.body,
        commit_messages,
        related_issues,
    })
}
