use crate::error::{Result, StoreError};
use base64::Engine;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_MS: u64 = 1_000;
const USER_AGENT: &str = concat!("argus-review/", env!("CARGO_PKG_VERSION"));

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_DIFF: &str = "application/vnd.github.diff";
const ACCEPT_RAW: &str = "application/vnd.github.raw";

/// Thin wrapper around the GitHub REST and Git Data APIs.
///
/// Transient failures (429, 5xx, timeouts) are retried with bounded
/// exponential backoff; everything else maps straight into the store
/// error taxonomy. The token never appears in errors or logs.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    token: String,
    repo: String,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, repo: impl Into<String>) -> Self {
        GitHubClient {
            http: Client::new(),
            token: token.into(),
            repo: repo.into(),
            base_url: "https://api.github.com".to_string(),
        }
    }

    /// Point the client at a different API host (tests, GHES).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    // ------------------------------------------------------------------
    // Git Data API
    // ------------------------------------------------------------------

    /// SHA the branch ref points at, or `None` if the branch is absent.
    pub async fn get_branch_sha(&self, branch: &str) -> Result<Option<String>> {
        let path = format!("/repos/{}/git/ref/heads/{branch}", self.repo);
        match self.get_json::<RefResponse>("get-ref", &path, ACCEPT_JSON).await {
            Ok(r) => Ok(Some(r.object.sha)),
            Err(StoreError::Http { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_commit_tree_sha(&self, commit_sha: &str) -> Result<String> {
        let path = format!("/repos/{}/git/commits/{commit_sha}", self.repo);
        let commit: CommitResponse = self.get_json("get-commit", &path, ACCEPT_JSON).await?;
        Ok(commit.tree.sha)
    }

    pub async fn get_tree_recursive(&self, tree_sha: &str) -> Result<Vec<TreeEntry>> {
        let path = format!("/repos/{}/git/trees/{tree_sha}?recursive=1", self.repo);
        let tree: TreeResponse = self.get_json("get-tree", &path, ACCEPT_JSON).await?;
        if tree.truncated {
            log::warn!("tree listing for {tree_sha} was truncated by the API");
        }
        Ok(tree.tree)
    }

    pub async fn get_blob(&self, blob_sha: &str) -> Result<Vec<u8>> {
        let path = format!("/repos/{}/git/blobs/{blob_sha}", self.repo);
        let blob: BlobResponse = self.get_json("get-blob", &path, ACCEPT_JSON).await?;
        let packed: String = blob.content.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(packed)
            .map_err(|e| StoreError::Structural {
                what: format!("blob {blob_sha}"),
                cause: e.to_string(),
            })
    }

    pub async fn create_blob(&self, content: &[u8]) -> Result<String> {
        let path = format!("/repos/{}/git/blobs", self.repo);
        let body = CreateBlobRequest {
            content: base64::engine::general_purpose::STANDARD.encode(content),
            encoding: "base64",
        };
        let created: ShaResponse = self.post_json("create-blob", &path, &body).await?;
        Ok(created.sha)
    }

    pub async fn create_tree(
        &self,
        base_tree: Option<&str>,
        entries: &[NewTreeEntry],
    ) -> Result<String> {
        let path = format!("/repos/{}/git/trees", self.repo);
        let body = CreateTreeRequest {
            base_tree: base_tree.map(str::to_string),
            tree: entries.to_vec(),
        };
        let created: ShaResponse = self.post_json("create-tree", &path, &body).await?;
        Ok(created.sha)
    }

    pub async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parents: &[String],
    ) -> Result<String> {
        let path = format!("/repos/{}/git/commits", self.repo);
        let body = CreateCommitRequest {
            message: message.to_string(),
            tree: tree_sha.to_string(),
            parents: parents.to_vec(),
        };
        let created: ShaResponse = self.post_json("create-commit", &path, &body).await?;
        Ok(created.sha)
    }

    pub async fn create_ref(&self, branch: &str, sha: &str) -> Result<()> {
        let path = format!("/repos/{}/git/refs", self.repo);
        let body = CreateRefRequest {
            reference: format!("refs/heads/{branch}"),
            sha: sha.to_string(),
        };
        let _: RefResponse = self.post_json("create-ref", &path, &body).await?;
        Ok(())
    }

    /// Fast-forward ref update. A non-fast-forward rejection means another
    /// run moved the ref first and surfaces as `ConcurrentWrite`.
    pub async fn update_ref(&self, branch: &str, sha: &str) -> Result<()> {
        let path = format!("/repos/{}/git/refs/heads/{branch}", self.repo);
        let body = UpdateRefRequest {
            sha: sha.to_string(),
            force: false,
        };
        match self.patch_json::<_, RefResponse>("update-ref", &path, &body).await {
            Ok(_) => Ok(()),
            Err(StoreError::Http { status: 409 | 422, .. }) => Err(StoreError::ConcurrentWrite {
                reference: format!("heads/{branch}"),
                expected: sha.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Pull request surface
    // ------------------------------------------------------------------

    pub async fn get_pull(&self, number: u64) -> Result<PullRequestInfo> {
        let path = format!("/repos/{}/pulls/{number}", self.repo);
        let raw: PullResponse = self.get_json("get-pull", &path, ACCEPT_JSON).await?;
        Ok(PullRequestInfo {
            number,
            title: raw.title,
            body: raw.body.unwrap_or_default(),
            head_sha: raw.head.sha,
            base_sha: raw.base.sha,
        })
    }

    pub async fn get_pull_diff(&self, number: u64) -> Result<String> {
        let path = format!("/repos/{}/pulls/{number}", self.repo);
        self.get_text("get-diff", &path, ACCEPT_DIFF).await
    }

    pub async fn list_pull_commit_messages(&self, number: u64) -> Result<Vec<String>> {
        let path = format!("/repos/{}/pulls/{number}/commits", self.repo);
        let commits: Vec<PullCommit> = self.get_json("list-commits", &path, ACCEPT_JSON).await?;
        Ok(commits.into_iter().map(|c| c.commit.message).collect())
    }

    pub async fn search_issues(&self, query: &str) -> Result<Vec<IssueRef>> {
        let encoded: String = query
            .chars()
            .map(|c| if c == ' ' { '+' } else { c })
            .collect();
        let path = format!("/search/issues?q={encoded}+repo:{}", self.repo);
        let found: IssueSearchResponse = self.get_json("search-issues", &path, ACCEPT_JSON).await?;
        Ok(found.items)
    }

    pub async fn get_file_content(&self, file_path: &str, git_ref: &str) -> Result<String> {
        let path = format!("/repos/{}/contents/{file_path}?ref={git_ref}", self.repo);
        self.get_text("get-file", &path, ACCEPT_RAW).await
    }

    pub async fn post_review(
        &self,
        number: u64,
        body: &str,
        comments: &[ReviewCommentPayload],
    ) -> Result<()> {
        let path = format!("/repos/{}/pulls/{number}/reviews", self.repo);
        let payload = CreateReviewRequest {
            body: body.to_string(),
            event: "COMMENT",
            comments: comments.to_vec(),
        };
        let _ = self.post_raw("post-review", &path, &payload).await?;
        Ok(())
    }

    pub async fn post_issue_comment(&self, number: u64, body: &str) -> Result<()> {
        let path = format!("/repos/{}/issues/{number}/comments", self.repo);
        let payload = IssueCommentRequest { body: body.to_string() };
        let _ = self.post_raw("post-comment", &path, &payload).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    async fn get_json<T: DeserializeOwned>(
        &self,
        stage: &'static str,
        path: &str,
        accept: &'static str,
    ) -> Result<T> {
        let response = self
            .send_with_retry(stage, path, || {
                self.http
                    .get(format!("{}{path}", self.base_url))
                    .header("accept", accept)
            })
            .await?;
        response.json().await.map_err(|e| StoreError::Structural {
            what: format!("{stage} response"),
            cause: e.to_string(),
        })
    }

    async fn get_text(
        &self,
        stage: &'static str,
        path: &str,
        accept: &'static str,
    ) -> Result<String> {
        let response = self
            .send_with_retry(stage, path, || {
                self.http
                    .get(format!("{}{path}", self.base_url))
                    .header("accept", accept)
            })
            .await?;
        response.text().await.map_err(|e| StoreError::Structural {
            what: format!("{stage} response"),
            cause: e.to_string(),
        })
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        stage: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.post_raw(stage, path, body).await?;
        response.json().await.map_err(|e| StoreError::Structural {
            what: format!("{stage} response"),
            cause: e.to_string(),
        })
    }

    async fn post_raw<B: Serialize>(
        &self,
        stage: &'static str,
        path: &str,
        body: &B,
    ) -> Result<Response> {
        let payload = serde_json::to_vec(body)?;
        self.send_with_retry(stage, path, || {
            self.http
                .post(format!("{}{path}", self.base_url))
                .header("accept", ACCEPT_JSON)
                .header("content-type", "application/json")
                .body(payload.clone())
        })
        .await
    }

    async fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        stage: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let payload = serde_json::to_vec(body)?;
        let response = self
            .send_with_retry(stage, path, || {
                self.http
                    .patch(format!("{}{path}", self.base_url))
                    .header("accept", ACCEPT_JSON)
                    .header("content-type", "application/json")
                    .body(payload.clone())
            })
            .await?;
        response.json().await.map_err(|e| StoreError::Structural {
            what: format!("{stage} response"),
            cause: e.to_string(),
        })
    }

    async fn send_with_retry(
        &self,
        stage: &'static str,
        target: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<Response> {
        let mut last: Option<StoreError> = None;

        for attempt in 0..RETRY_ATTEMPTS {
            if attempt > 0 {
                let delay = RETRY_BASE_MS * (1 << attempt) + jitter_ms(target, attempt);
                log::debug!("{stage}: retry {attempt} after {delay}ms");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let request = build()
                .header("authorization", format!("Bearer {}", self.token))
                .header("user-agent", USER_AGENT)
                .timeout(REQUEST_TIMEOUT);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if is_transient_status(status) {
                        last = Some(StoreError::Transient {
                            stage,
                            target: target.to_string(),
                            cause: format!("http {status}"),
                        });
                        continue;
                    }
                    return Err(StoreError::Http {
                        status: status.as_u16(),
                        stage,
                        target: target.to_string(),
                    });
                }
                Err(e) => {
                    // Connection failures and timeouts are transient.
                    last = Some(StoreError::Transient {
                        stage,
                        target: target.to_string(),
                        cause: e.to_string(),
                    });
                }
            }
        }

        Err(last.unwrap_or(StoreError::Transient {
            stage,
            target: target.to_string(),
            cause: "retries exhausted".to_string(),
        }))
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Deterministic jitter derived from the target, so retries from parallel
/// fetches do not land on the same instant.
fn jitter_ms(target: &str, attempt: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    target.hash(&mut hasher);
    attempt.hash(&mut hasher);
    hasher.finish() % 250
}

// ----------------------------------------------------------------------
// Wire types
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    tree: TreeRef,
}

#[derive(Debug, Deserialize)]
struct TreeRef {
    sha: String,
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateBlobRequest {
    content: String,
    encoding: &'static str,
}

/// Tree entry for `create_tree`. Mode is always a regular file; the data
/// branch holds nothing executable. A `None` sha deletes the path from
/// the base tree.
#[derive(Debug, Clone, Serialize)]
pub struct NewTreeEntry {
    pub path: String,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub entry_type: &'static str,
    pub sha: Option<String>,
}

impl NewTreeEntry {
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        NewTreeEntry {
            path: path.into(),
            mode: "100644",
            entry_type: "blob",
            sha: Some(sha.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        NewTreeEntry {
            path: path.into(),
            mode: "100644",
            entry_type: "blob",
            sha: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateTreeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    base_tree: Option<String>,
    tree: Vec<NewTreeEntry>,
}

#[derive(Debug, Serialize)]
struct CreateCommitRequest {
    message: String,
    tree: String,
    parents: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest {
    #[serde(rename = "ref")]
    reference: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct UpdateRefRequest {
    sha: String,
    force: bool,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    title: String,
    body: Option<String>,
    head: PullRef,
    base: PullRef,
}

#[derive(Debug, Deserialize)]
struct PullRef {
    sha: String,
}

/// PR metadata consumed by the context collector and the pipelines.
#[derive(Debug, Clone)]
pub struct PullRequestInfo {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub head_sha: String,
    pub base_sha: String,
}

#[derive(Debug, Deserialize)]
struct PullCommit {
    commit: PullCommitDetail,
}

#[derive(Debug, Deserialize)]
struct PullCommitDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssueSearchResponse {
    items: Vec<IssueRef>,
}

/// A related issue surfaced by search.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRef {
    pub number: u64,
    pub title: String,
}

/// Inline review comment as the publisher sends it.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewCommentPayload {
    pub path: String,
    pub line: u32,
    pub body: String,
}

#[derive(Debug, Serialize)]
struct CreateReviewRequest {
    body: String,
    event: &'static str,
    comments: Vec<ReviewCommentPayload>,
}

#[derive(Debug, Serialize)]
struct IssueCommentRequest {
    body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::UNPROCESSABLE_ENTITY));
    }

    #[test]
    fn jitter_is_bounded_and_deterministic() {
        let a = jitter_ms("/repos/x/git/trees/abc", 1);
        let b = jitter_ms("/repos/x/git/trees/abc", 1);
        assert_eq!(a, b);
        assert!(a < 250);
    }

    #[test]
    fn tree_entry_defaults() {
        let entry = NewTreeEntry::blob("manifest.json", "abc123");
        assert_eq!(entry.mode, "100644");
        assert_eq!(entry.entry_type, "blob");
    }

    #[test]
    fn deletion_entry_serializes_a_null_sha() {
        let entry = NewTreeEntry::delete("shard_old.json");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"sha\":null"));
    }
}
