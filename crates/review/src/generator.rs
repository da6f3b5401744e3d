use crate::error::Result;
use crate::output::ReviewOutput;
use async_trait::async_trait;

/// Port for the opaque structured-output generator.
///
/// The core hands over the assembled prompt and expects back exactly the
/// [`ReviewOutput`] JSON shape. Model choice, provider protocol, per-call
/// token limits, and response repair are all implementation concerns
/// behind this boundary.
#[async_trait]
pub trait ReviewGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<ReviewOutput>;
}
