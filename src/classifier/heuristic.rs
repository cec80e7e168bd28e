use std::sync::Arc;

use async_trait::async_trait;

use crate::classifier::{Tier, TierInput};
use crate::error::Result;
use crate::outcome::{
    Catalog, ClassificationResult, DetectionLayer, ExecutionSummary, MetricKey, Reasoning,
};

/// Field-presence score of one candidate outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldScore {
    pub metric_key: MetricKey,
    pub score: f64,
    pub expected: Vec<String>,
    pub found: Vec<String>,
    pub missing: Vec<String>,
}

/// Scores each outcome by the fraction of its expected fields present.
pub struct HeuristicTier {
    catalog: Arc<Catalog>,
    min_score: f64,
}

impl HeuristicTier {
    pub fn new(catalog: Arc<Catalog>, min_score: f64) -> Self {
        Self { catalog, min_score }
    }

    /// Highest-scoring outcome.
    ///
    /// Ties go to the outcome declared first in `MetricKey::CANONICAL`
    /// (meeting_booked, lead_created, ticket_created, ticket_resolved,
    /// email_sent, deal_won). The order is arbitrary but fixed, so equal
    /// scores always resolve the same way.
    pub fn best_match(&self, summary: &ExecutionSummary) -> Option<FieldScore> {
        let mut best: Option<FieldScore> = None;

        for (metric_key, expected) in self.catalog.expected_fields() {
            if expected.is_empty() {
                continue;
            }

            let (found, missing): (Vec<String>, Vec<String>) = expected
                .iter()
                .cloned()
                .partition(|field| summary.has_field(field));
            let score = found.len() as f64 / expected.len() as f64;

            // Strictly greater: an earlier outcome keeps a tie
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(FieldScore {
                    metric_key,
                    score,
                    expected: expected.to_vec(),
                    found,
                    missing,
                });
            }
        }

        best
    }
}

#[async_trait]
impl Tier for HeuristicTier {
    fn layer(&self) -> DetectionLayer {
        DetectionLayer::Heuristic
    }

    async fn attempt(&self, input: &TierInput<'_>) -> Result<Option<ClassificationResult>> {
        let Some(best) = self.best_match(input.summary) else {
            return Ok(None);
        };

        if best.score <= 0.0 || best.score < self.min_score {
            tracing::debug!(
                candidate = %best.metric_key,
                score = best.score,
                min_score = self.min_score,
                "Heuristic score below minimum"
            );
            return Ok(None);
        }

        Ok(Some(ClassificationResult {
            metric_key: best.metric_key,
            confidence: best.score,
            detection_layer: DetectionLayer::Heuristic,
            reasoning: Reasoning::FieldMatch {
                expected: best.expected,
                found: best.found,
                missing: best.missing,
            },
        }))
    }
}
