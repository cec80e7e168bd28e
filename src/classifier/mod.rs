pub mod ai;
pub mod engine;
pub mod heuristic;
pub mod vector;

use async_trait::async_trait;

use crate::error::Result;
use crate::outcome::{ClassificationResult, DetectionLayer, ExecutionSummary};

pub use ai::AiTier;
pub use engine::OutcomeClassifier;
pub use heuristic::HeuristicTier;
pub use vector::VectorTier;

/// What every tier sees for one classification call.
pub struct TierInput<'a> {
    pub summary: &'a ExecutionSummary,
    pub company_id: Option<&'a str>,
    /// `summary.describe()`, rendered once per call.
    pub description: &'a str,
}

/// One step of the fallback chain.
///
/// `Ok(None)` means the tier ran but nothing cleared its threshold. `Err`
/// means a backing service failed; the orchestrator logs it and moves on.
#[async_trait]
pub trait Tier: Send + Sync {
    fn layer(&self) -> DetectionLayer;

    async fn attempt(&self, input: &TierInput<'_>) -> Result<Option<ClassificationResult>>;
}
