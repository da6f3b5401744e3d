use crate::error::ActionError;
use argus_core::Mode;
use serde::Deserialize;
use std::path::Path;

/// Secrets and identifiers from the process environment. Never written to
/// disk or to any artifact; the debug representation hides the tokens.
pub struct Secrets {
    pub github_token: String,
    pub repository: String,
    pub event_path: Option<String>,
    pub llm_api_key: Option<String>,
    pub embedding_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ActionError> {
        Ok(Secrets {
            github_token: require("GITHUB_TOKEN")?,
            repository: require("GITHUB_REPOSITORY")?,
            event_path: std::env::var("GITHUB_EVENT_PATH").ok(),
            llm_api_key: std::env::var("ANTHROPIC_API_KEY")
                .or_else(|_| std::env::var("ARGUS_LLM_API_KEY"))
                .ok(),
            embedding_api_key: std::env::var("ARGUS_EMBEDDING_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok(),
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("repository", &self.repository)
            .field("event_path", &self.event_path)
            .finish_non_exhaustive()
    }
}

fn require(name: &'static str) -> Result<String, ActionError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ActionError::MissingEnv(name))
}

/// Mode selector, read from `ARGUS_MODE` at startup.
pub fn mode_from_env() -> Result<Mode, ActionError> {
    let raw = require("ARGUS_MODE")?;
    raw.parse()
        .map_err(|_| ActionError::Config(format!("invalid ARGUS_MODE {raw:?}")))
}

/// The slice of the event payload the pipelines need.
#[derive(Debug, Clone, Default)]
pub struct EventInfo {
    pub pr_number: Option<u64>,
    pub head_sha: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    pull_request: Option<RawPull>,
    /// Push events carry the new head as `after`.
    after: Option<String>,
}

#[derive(Deserialize)]
struct RawPull {
    number: u64,
    head: RawHead,
}

#[derive(Deserialize)]
struct RawHead {
    sha: String,
}

pub fn read_event(path: &Path) -> Result<EventInfo, ActionError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ActionError::Event(format!("cannot read {}: {e}", path.display())))?;
    let raw: RawEvent =
        serde_json::from_str(&text).map_err(|e| ActionError::Event(e.to_string()))?;

    Ok(EventInfo {
        pr_number: raw.pull_request.as_ref().map(|p| p.number),
        head_sha: raw
            .pull_request
            .map(|p| p.head.sha)
            .or(raw.after),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn pull_request_event_parses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        fs::write(
            &path,
            r#"{"pull_request": {"number": 7, "head": {"sha": "abc123"}}}"#,
        )
        .unwrap();
        let event = read_event(&path).unwrap();
        assert_eq!(event.pr_number, Some(7));
        assert_eq!(event.head_sha.as_deref(), Some("abc123"));
    }

    #[test]
    fn push_event_uses_after() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        fs::write(&path, r#"{"after": "def456"}"#).unwrap();
        let event = read_event(&path).unwrap();
        assert_eq!(event.pr_number, None);
        assert_eq!(event.head_sha.as_deref(), Some("def456"));
    }

    #[test]
    fn secrets_debug_hides_tokens() {
        let secrets = Secrets {
            github_token: "ghp_secret".into(),
            repository: "org/repo".into(),
            event_path: None,
            llm_api_key: Some("sk-secret".into()),
            embedding_api_key: None,
        };
        let debug = format!("{secrets:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("org/repo"));
    }
}
