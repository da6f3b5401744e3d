use crate::error::Result;
use crate::query::{ContextItem, RetrievalQuery, RetrievalStrategy, StrategyKind};
use argus_core::{FilePath, LineRange};
use argus_map::{AdjacencyIndex, CodebaseMap};
use argus_parser::CodeChunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Hard cap on tool-using iterations per session.
pub const MAX_AGENT_ITERATIONS: usize = 8;

/// Items below this relevance are never admitted from the agent.
const SCORE_FLOOR: f64 = 0.5;

/// One tool invocation the agent may request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolRequest {
    FindSymbol { name: String },
    ReadFile { path: String, start: u32, end: u32 },
    ListDependents { symbol: String },
}

/// A context selection the agent finishes with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedContext {
    pub path: String,
    pub start: u32,
    pub end: u32,
    /// Self-reported relevance; clamped to `[0.5, 1.0]` on admission.
    pub relevance: f64,
}

/// What the model decided to do this iteration.
#[derive(Debug, Clone)]
pub enum AgentDecision {
    Call(ToolRequest),
    Finish(Vec<SelectedContext>),
}

/// One completed tool round in the session transcript.
#[derive(Debug, Clone)]
pub struct AgentExchange {
    pub request: ToolRequest,
    pub output: String,
}

/// Port for the tool-calling LLM session.
///
/// Implementations enforce their own per-call token budget; the strategy
/// enforces the iteration cap and the score floor.
#[async_trait]
pub trait AgentModel: Send + Sync {
    async fn step(
        &self,
        query: &RetrievalQuery,
        transcript: &[AgentExchange],
    ) -> Result<AgentDecision>;
}

/// The three tools the session is equipped with, backed by the loaded map,
/// the chunk corpus, and (when available) the working tree.
pub struct ToolBox {
    map: Arc<CodebaseMap>,
    chunks: Vec<CodeChunk>,
    root: Option<PathBuf>,
    adjacency: AdjacencyIndex,
}

impl ToolBox {
    pub fn new(map: Arc<CodebaseMap>, chunks: Vec<CodeChunk>, root: Option<PathBuf>) -> Self {
        let adjacency = map.graph.adjacency();
        ToolBox {
            map,
            chunks,
            root,
            adjacency,
        }
    }

    fn find_symbol(&self, name: &str) -> Vec<&CodeChunk> {
        self.chunks
            .iter()
            .filter(|c| {
                c.anchor_symbol
                    .as_deref()
                    .is_some_and(|anchor| anchor == name || anchor.ends_with(&format!(".{name}")))
            })
            .collect()
    }

    async fn read_file(&self, path: &str, start: u32, end: u32) -> Option<String> {
        let file_path = FilePath::new(path);
        if let Some(root) = &self.root {
            if let Ok(content) = tokio::fs::read_to_string(root.join(file_path.as_str())).await {
                let lines: Vec<&str> = content.lines().collect();
                let from = (start.max(1) as usize) - 1;
                let to = (end as usize).min(lines.len());
                if from < to {
                    return Some(lines[from..to].join("\n"));
                }
                return None;
            }
        }
        // No working tree: serve from the chunk corpus.
        let wanted = LineRange {
            start: start.min(end.max(1)),
            end: end.max(start),
        };
        self.chunks
            .iter()
            .find(|c| c.file_path == file_path && c.line_range.overlaps(&wanted))
            .map(|c| c.text.clone())
    }

    fn list_dependents(&self, symbol: &str) -> Vec<String> {
        self.adjacency
            .dependents(symbol)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    async fn run(&self, request: &ToolRequest) -> String {
        match request {
            ToolRequest::FindSymbol { name } => {
                let found = self.find_symbol(name);
                if found.is_empty() {
                    format!("no chunks for symbol {name:?}")
                } else {
                    found
                        .iter()
                        .map(|c| format!("{} lines {}\n{}", c.file_path, c.line_range, c.text))
                        .collect::<Vec<_>>()
                        .join("\n---\n")
                }
            }
            ToolRequest::ReadFile { path, start, end } => self
                .read_file(path, *start, *end)
                .await
                .unwrap_or_else(|| format!("cannot read {path}:{start}-{end}")),
            ToolRequest::ListDependents { symbol } => {
                let dependents = self.list_dependents(symbol);
                if dependents.is_empty() {
                    format!("no dependents of {symbol}")
                } else {
                    dependents.join("\n")
                }
            }
        }
    }
}

/// LLM-guided exploration, gated on `enable_agentic`.
///
/// The session runs at most [`MAX_AGENT_ITERATIONS`] tool rounds; the
/// orchestrator adds the wall-clock cap on top. A model failure yields
/// zero items, like every provider failure.
pub struct AgenticStrategy {
    model: Arc<dyn AgentModel>,
    tools: ToolBox,
}

impl AgenticStrategy {
    pub fn new(model: Arc<dyn AgentModel>, tools: ToolBox) -> Self {
        AgenticStrategy { model, tools }
    }
}

#[async_trait]
impl RetrievalStrategy for AgenticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Agentic
    }

    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<ContextItem>> {
        let mut transcript: Vec<AgentExchange> = Vec::new();

        for iteration in 0..MAX_AGENT_ITERATIONS {
            let decision = match self.model.step(query, &transcript).await {
                Ok(decision) => decision,
                Err(e) => {
                    log::warn!("agent model failed at iteration {iteration}: {e}");
                    return Ok(Vec::new());
                }
            };

            match decision {
                AgentDecision::Call(request) => {
                    let output = self.tools.run(&request).await;
                    transcript.push(AgentExchange { request, output });
                }
                AgentDecision::Finish(selections) => {
                    return Ok(self.admit(selections).await);
                }
            }
        }

        log::debug!("agentic session hit the iteration cap without finishing");
        Ok(Vec::new())
    }
}

impl AgenticStrategy {
    async fn admit(&self, selections: Vec<SelectedContext>) -> Vec<ContextItem> {
        let mut items = Vec::new();
        for selection in selections {
            if selection.start == 0 || selection.start > selection.end {
                continue;
            }
            let text = self
                .tools
                .read_file(&selection.path, selection.start, selection.end)
                .await
                .unwrap_or_default();
            if text.is_empty() {
                continue;
            }
            items.push(ContextItem::new(
                StrategyKind::Agentic,
                FilePath::new(selection.path),
                LineRange {
                    start: selection.start,
                    end: selection.end,
                },
                text,
                selection.relevance.clamp(SCORE_FLOOR, 1.0),
            ));
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{CommitSha, ReviewDepth, TokenBudget, TokenCount};
    use std::sync::Mutex;

    fn chunk(path: &str, start: u32, end: u32, anchor: &str, text: &str) -> CodeChunk {
        CodeChunk {
            file_path: FilePath::new(path),
            line_range: LineRange { start, end },
            text: text.to_string(),
            anchor_symbol: Some(anchor.to_string()),
        }
    }

    fn toolbox() -> ToolBox {
        let map = CodebaseMap::new(CommitSha::parse("f".repeat(40)).unwrap());
        ToolBox::new(
            Arc::new(map),
            vec![chunk("b/z.py", 1, 2, "g", "def g():\n    return 2")],
            None,
        )
    }

    fn query() -> RetrievalQuery {
        RetrievalQuery {
            changed_files: vec![],
            changed_symbols: vec![],
            diff_text: String::new(),
            depth: ReviewDepth::Deep,
            budget: TokenBudget::from_total(TokenCount(10_000)),
        }
    }

    /// Scripted model: plays back a fixed decision sequence.
    struct ScriptedModel {
        steps: Mutex<Vec<AgentDecision>>,
    }

    impl ScriptedModel {
        fn new(mut steps: Vec<AgentDecision>) -> Self {
            steps.reverse();
            ScriptedModel {
                steps: Mutex::new(steps),
            }
        }
    }

    #[async_trait]
    impl AgentModel for ScriptedModel {
        async fn step(
            &self,
            _query: &RetrievalQuery,
            _transcript: &[AgentExchange],
        ) -> Result<AgentDecision> {
            Ok(self
                .steps
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(AgentDecision::Finish(vec![])))
        }
    }

    #[tokio::test]
    async fn tool_round_then_finish_produces_clamped_items() {
        let model = ScriptedModel::new(vec![
            AgentDecision::Call(ToolRequest::FindSymbol { name: "g".into() }),
            AgentDecision::Finish(vec![SelectedContext {
                path: "b/z.py".into(),
                start: 1,
                end: 2,
                relevance: 0.1,
            }]),
        ]);
        let strategy = AgenticStrategy::new(Arc::new(model), toolbox());
        let items = strategy.retrieve(&query()).await.unwrap();

        assert_eq!(items.len(), 1);
        // Self-reported 0.1 is clamped up to the floor.
        assert_eq!(items[0].score, 0.5);
        assert!(items[0].text.contains("def g()"));
    }

    #[tokio::test]
    async fn iteration_cap_bounds_the_session() {
        let calls: Vec<AgentDecision> = (0..20)
            .map(|_| AgentDecision::Call(ToolRequest::ListDependents { symbol: "x".into() }))
            .collect();
        let strategy = AgenticStrategy::new(Arc::new(ScriptedModel::new(calls)), toolbox());
        let items = strategy.retrieve(&query()).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn model_failure_yields_zero_items() {
        struct FailingModel;

        #[async_trait]
        impl AgentModel for FailingModel {
            async fn step(
                &self,
                _query: &RetrievalQuery,
                _transcript: &[AgentExchange],
            ) -> Result<AgentDecision> {
                Err(crate::error::RetrievalError::Agent("no provider".into()))
            }
        }

        let strategy = AgenticStrategy::new(Arc::new(FailingModel), toolbox());
        assert!(strategy.retrieve(&query()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_symbol_matches_method_suffix() {
        let map = CodebaseMap::new(CommitSha::parse("f".repeat(40)).unwrap());
        let tools = ToolBox::new(
            Arc::new(map),
            vec![chunk("svc.py", 1, 4, "Service.run", "class body")],
            None,
        );
        assert_eq!(tools.find_symbol("run").len(), 1);
        assert_eq!(tools.find_symbol("missing").len(), 0);
    }
}
