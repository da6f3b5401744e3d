use argus_memory::{MemoryError, PatternAnalyzer, PatternEntry};
use argus_retrieval::{
    AgentDecision, AgentExchange, AgentModel, EmbeddingProvider, RetrievalError, RetrievalQuery,
    SelectedContext, ToolRequest,
};
use argus_review::{ReviewError, ReviewGenerator, ReviewOutput};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_OUTPUT_TOKENS: u32 = 8_192;

const REVIEW_SYSTEM: &str = "\
You are a senior code reviewer. Review the pull request using the diff and \
the provided repository context. Respond with JSON only, matching:
{\"summary\": \"...\", \"comments\": [{\"path\": \"...\", \"line\": N, \
\"severity\": \"critical|warning|suggestion|praise\", \
\"category\": \"bug|security|performance|style|architecture|testing|documentation\", \
\"confidence\": 0.0-1.0, \"message\": \"...\"}]}";

const ANALYZE_SYSTEM: &str = "\
You study a codebase outline and a recent diff, and extract durable \
conventions of this codebase. Respond with a JSON array of:
{\"category\": \"style|naming|architecture|testing|error_handling|concurrency\", \
\"description\": \"...\", \"confidence\": 0.0-1.0, \"examples\": [\"path:start-end\"]}";

const AGENT_SYSTEM: &str = "\
You explore a repository to find code relevant to a diff. Each turn, respond \
with JSON only: {\"action\": \"find_symbol\", \"name\": \"...\"} or \
{\"action\": \"read_file\", \"path\": \"...\", \"start\": N, \"end\": N} or \
{\"action\": \"list_dependents\", \"symbol\": \"...\"} or \
{\"action\": \"finish\", \"selections\": [{\"path\": \"...\", \"start\": N, \
\"end\": N, \"relevance\": 0.0-1.0}]}";

/// Structured-output generator over the Anthropic Messages API.
///
/// One provider instance serves the generator, analyzer, and agent ports;
/// only the system prompt differs.
pub struct AnthropicProvider {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        AnthropicProvider {
            http: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(PROVIDER_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("http {status}: {text}"));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| format!("unparseable response: {e}"))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err("empty completion".to_string());
        }
        Ok(text)
    }
}

#[async_trait]
impl ReviewGenerator for AnthropicProvider {
    async fn generate(&self, prompt: &str) -> argus_review::Result<ReviewOutput> {
        let raw = self
            .complete(REVIEW_SYSTEM, prompt)
            .await
            .map_err(ReviewError::Generation)?;
        serde_json::from_str(extract_json(&raw))
            .map_err(|e| ReviewError::Generation(format!("bad review JSON: {e}")))
    }
}

#[async_trait]
impl PatternAnalyzer for AnthropicProvider {
    async fn analyze(
        &self,
        outline_text: &str,
        diff_text: &str,
    ) -> argus_memory::Result<Vec<PatternEntry>> {
        let mut user = format!("## Outline\n{outline_text}\n");
        if !diff_text.is_empty() {
            user.push_str(&format!("\n## Recent diff\n```diff\n{diff_text}\n```\n"));
        }
        let raw = self
            .complete(ANALYZE_SYSTEM, &user)
            .await
            .map_err(MemoryError::Analysis)?;
        serde_json::from_str(extract_json(&raw))
            .map_err(|e| MemoryError::Analysis(format!("bad pattern JSON: {e}")))
    }
}

#[async_trait]
impl AgentModel for AnthropicProvider {
    async fn step(
        &self,
        query: &RetrievalQuery,
        transcript: &[AgentExchange],
    ) -> argus_retrieval::Result<AgentDecision> {
        let mut user = format!("## Diff\n```diff\n{}\n```\n", query.diff_text);
        if !query.changed_symbols.is_empty() {
            user.push_str(&format!(
                "\n## Changed symbols\n{}\n",
                query.changed_symbols.join(", ")
            ));
        }
        for exchange in transcript {
            user.push_str(&format!(
                "\n## Tool call\n{}\n## Result\n{}\n",
                serde_json::to_string(&exchange.request).unwrap_or_default(),
                exchange.output,
            ));
        }
        user.push_str("\nRespond with your next action as JSON.");

        let raw = self
            .complete(AGENT_SYSTEM, &user)
            .await
            .map_err(RetrievalError::Agent)?;
        let action: RawAgentAction = serde_json::from_str(extract_json(&raw))
            .map_err(|e| RetrievalError::Agent(format!("bad action JSON: {e}")))?;
        Ok(action.into())
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum RawAgentAction {
    FindSymbol { name: String },
    ReadFile { path: String, start: u32, end: u32 },
    ListDependents { symbol: String },
    Finish { selections: Vec<SelectedContext> },
}

impl From<RawAgentAction> for AgentDecision {
    fn from(raw: RawAgentAction) -> Self {
        match raw {
            RawAgentAction::FindSymbol { name } => {
                AgentDecision::Call(ToolRequest::FindSymbol { name })
            }
            RawAgentAction::ReadFile { path, start, end } => {
                AgentDecision::Call(ToolRequest::ReadFile { path, start, end })
            }
            RawAgentAction::ListDependents { symbol } => {
                AgentDecision::Call(ToolRequest::ListDependents { symbol })
            }
            RawAgentAction::Finish { selections } => AgentDecision::Finish(selections),
        }
    }
}

/// Embedding provider over an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct OpenAiEmbeddingProvider {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        OpenAiEmbeddingProvider {
            http: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> argus_retrieval::Result<Vec<Vec<f32>>> {
        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .timeout(PROVIDER_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Embedding(format!("http {status}")));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

/// The model's JSON often arrives inside a code fence; take the outermost
/// object or array.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if s < e => &trimmed[s..=e],
        _ => trimmed,
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_strips_fences_and_prose() {
        let fenced = "Here you go:\n```json\n{\"summary\": \"ok\"}\n```";
        assert_eq!(extract_json(fenced), "{\"summary\": \"ok\"}");
        assert_eq!(extract_json("[1, 2]"), "[1, 2]");
        assert_eq!(extract_json("no json here"), "no json here");
    }

    #[test]
    fn agent_actions_parse() {
        let call: RawAgentAction =
            serde_json::from_str(r#"{"action": "find_symbol", "name": "g"}"#).unwrap();
        assert!(matches!(
            AgentDecision::from(call),
            AgentDecision::Call(ToolRequest::FindSymbol { .. })
        ));

        let finish: RawAgentAction = serde_json::from_str(
            r#"{"action": "finish",
                "selections": [{"path": "a.py", "start": 1, "end": 4, "relevance": 0.9}]}"#,
        )
        .unwrap();
        match AgentDecision::from(finish) {
            AgentDecision::Finish(selections) => assert_eq!(selections.len(), 1),
            _ => panic!("expected finish"),
        }
    }
}
