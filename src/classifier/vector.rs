use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::classifier::{Tier, TierInput};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::outcome::{ClassificationResult, DetectionLayer, Reasoning};
use crate::store::DescriptionStore;

/// Nearest learned description by cosine similarity.
pub struct VectorTier {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DescriptionStore>,
    threshold: f64,
    search_limit: usize,
    call_timeout: Duration,
}

impl VectorTier {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DescriptionStore>,
        threshold: f64,
        search_limit: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            store,
            threshold,
            search_limit,
            call_timeout,
        }
    }
}

#[async_trait]
impl Tier for VectorTier {
    fn layer(&self) -> DetectionLayer {
        DetectionLayer::VectorSemantic
    }

    async fn attempt(&self, input: &TierInput<'_>) -> Result<Option<ClassificationResult>> {
        let embedding = timeout(self.call_timeout, self.embedder.embed(input.description)).await??;

        let matches = timeout(
            self.call_timeout,
            self.store
                .search(&embedding, input.company_id, self.search_limit),
        )
        .await??;

        let Some(best) = matches.into_iter().next() else {
            tracing::debug!("No learned descriptions to compare against");
            return Ok(None);
        };

        if best.similarity < self.threshold || best.description.metric_key.is_unknown() {
            tracing::debug!(
                similarity = best.similarity,
                threshold = self.threshold,
                candidate = %best.description.metric_key,
                "Best vector match below threshold"
            );
            return Ok(None);
        }

        let similarity = best.similarity.clamp(0.0, 1.0);
        Ok(Some(ClassificationResult {
            metric_key: best.description.metric_key,
            confidence: similarity,
            detection_layer: DetectionLayer::VectorSemantic,
            reasoning: Reasoning::VectorMatch {
                matched_description: best.description.text,
                similarity,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::outcome::{ExecutionSummary, MetricKey};
    use crate::store::MemoryStore;
    use crate::testing::{description, FailingEmbedder, SlowEmbedder, StaticEmbedder};

    async fn tier_with(
        embedder: Arc<dyn Embedder>,
        key: MetricKey,
        stored: Vec<f32>,
        owner: Option<&str>,
    ) -> VectorTier {
        let store = Arc::new(MemoryStore::new(2));
        store.append(description(key, stored, owner)).await.unwrap();
        VectorTier::new(embedder, store, 0.80, 5, Duration::from_millis(200))
    }

    async fn run(tier: &VectorTier, company_id: Option<&str>) -> Result<Option<ClassificationResult>> {
        let summary = ExecutionSummary::new().with("note", "contract signed");
        let text = summary.describe();
        tier.attempt(&TierInput {
            summary: &summary,
            company_id,
            description: &text,
        })
        .await
    }

    #[tokio::test]
    async fn test_match_above_threshold() {
        let embedder = Arc::new(StaticEmbedder::new(vec![1.0, 0.0]));
        let tier = tier_with(embedder, MetricKey::DealWon, vec![1.0, 0.0], None).await;

        let result = run(&tier, None).await.unwrap().unwrap();
        assert_eq!(result.metric_key, MetricKey::DealWon);
        assert_eq!(result.detection_layer, DetectionLayer::VectorSemantic);
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert!(matches!(result.reasoning, Reasoning::VectorMatch { .. }));
    }

    #[tokio::test]
    async fn test_match_below_threshold() {
        let embedder = Arc::new(StaticEmbedder::new(vec![1.0, 0.0]));
        // cos = 0.62
        let tier = tier_with(embedder, MetricKey::DealWon, vec![0.62, 0.7846], None).await;
        assert!(run(&tier, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_other_tenants_rows_are_invisible() {
        let embedder = Arc::new(StaticEmbedder::new(vec![1.0, 0.0]));
        let tier = tier_with(embedder, MetricKey::DealWon, vec![1.0, 0.0], Some("c1")).await;
        assert!(run(&tier, Some("c2")).await.unwrap().is_none());
        assert!(run(&tier, Some("c1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_an_error() {
        let tier = tier_with(Arc::new(FailingEmbedder), MetricKey::DealWon, vec![1.0, 0.0], None).await;
        assert!(matches!(
            run(&tier, None).await,
            Err(AppError::ExternalServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_embedding_times_out() {
        let embedder = Arc::new(SlowEmbedder::new(vec![1.0, 0.0], Duration::from_secs(5)));
        let tier = tier_with(embedder, MetricKey::DealWon, vec![1.0, 0.0], None).await;
        assert!(matches!(
            run(&tier, None).await,
            Err(AppError::ExternalServiceUnavailable(_))
        ));
    }
}
