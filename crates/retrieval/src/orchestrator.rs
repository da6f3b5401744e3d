use crate::query::{ContextItem, RetrievalQuery, RetrievalResult, RetrievalStrategy, StrategyKind};
use crate::rank::Ranker;
use std::time::Duration;

const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(60);

/// Items contributed per strategy, for the run summary log.
#[derive(Debug, Clone)]
pub struct StrategyCount {
    pub kind: StrategyKind,
    pub items: usize,
}

/// Result of a full retrieval pass.
#[derive(Debug, Clone)]
pub struct RetrievalReport {
    pub result: RetrievalResult,
    pub counts: Vec<StrategyCount>,
}

/// Runs the configured strategies and funnels everything through the ranker.
///
/// Strategies execute concurrently (their inputs are frozen for the run),
/// but the ranker receives outputs in the fixed strategy order, so the
/// final item list is reproducible regardless of completion order. A
/// strategy that errors or exceeds its deadline contributes zero items.
pub struct RetrievalOrchestrator {
    strategies: Vec<Box<dyn RetrievalStrategy>>,
    ranker: Ranker,
    strategy_timeout: Duration,
}

impl RetrievalOrchestrator {
    pub fn new(strategies: Vec<Box<dyn RetrievalStrategy>>) -> Self {
        RetrievalOrchestrator {
            strategies,
            ranker: Ranker::new(),
            strategy_timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }

    pub async fn retrieve(&self, query: &RetrievalQuery) -> RetrievalReport {
        let runs = self.strategies.iter().map(|strategy| {
            let kind = strategy.kind();
            async move {
                let started = std::time::Instant::now();
                let outcome =
                    tokio::time::timeout(self.strategy_timeout, strategy.retrieve(query)).await;
                let items: Vec<ContextItem> = match outcome {
                    Ok(Ok(items)) => items,
                    Ok(Err(e)) => {
                        log::warn!("{kind} strategy failed: {e}");
                        Vec::new()
                    }
                    Err(_) => {
                        log::warn!(
                            "{kind} strategy timed out after {}s",
                            self.strategy_timeout.as_secs()
                        );
                        Vec::new()
                    }
                };
                log::debug!(
                    "{kind}: {} items in {}ms",
                    items.len(),
                    started.elapsed().as_millis()
                );
                (kind, items)
            }
        });

        let outputs: Vec<(StrategyKind, Vec<ContextItem>)> =
            futures::future::join_all(runs).await;

        let counts = outputs
            .iter()
            .map(|(kind, items)| StrategyCount {
                kind: *kind,
                items: items.len(),
            })
            .collect();

        let result = self.ranker.rank(
            outputs.into_iter().map(|(_, items)| items).collect(),
            &query.budget,
        );

        RetrievalReport { result, counts }
    }
}
