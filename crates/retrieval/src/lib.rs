//! # Argus Retrieval
//!
//! Hybrid context retrieval for PR review: a structural graph walk, a BM25
//! lexical index, optional dense-vector similarity, and optional LLM-driven
//! exploration — all funneled through one ranker with a strict token budget.
//!
//! Strategy scores are local confidences with no cross-strategy meaning;
//! normalization and the consensus bonus live in the ranker, which is the
//! single serialization point of the whole subsystem.

mod agentic;
mod error;
mod lexical;
mod orchestrator;
mod query;
mod rank;
mod semantic;
mod structural;
mod tokenize;

pub use agentic::{
    AgentDecision, AgentExchange, AgentModel, AgenticStrategy, SelectedContext, ToolBox,
    ToolRequest, MAX_AGENT_ITERATIONS,
};
pub use error::{Result, RetrievalError};
pub use lexical::LexicalStrategy;
pub use orchestrator::{RetrievalOrchestrator, RetrievalReport, StrategyCount};
pub use query::{
    ContextItem, RetrievalQuery, RetrievalResult, RetrievalStrategy, StrategyKind,
};
pub use rank::Ranker;
pub use semantic::{EmbeddingProvider, SemanticStrategy, MIN_SIMILARITY};
pub use structural::StructuralStrategy;
pub use tokenize::{extract_identifiers, split_identifiers};
