use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::timeout;

use crate::ai::prompt;
use crate::ai::{RawVerdict, Reasoner};
use crate::classifier::{Tier, TierInput};
use crate::error::Result;
use crate::outcome::{Catalog, ClassificationResult, DetectionLayer, MetricKey, Reasoning};

/// Last-resort tier: asks a language model for its best guess.
pub struct AiTier {
    reasoner: Arc<dyn Reasoner>,
    system_prompt: String,
    min_confidence: f64,
    call_timeout: Duration,
}

impl AiTier {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        catalog: &Catalog,
        min_confidence: f64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            reasoner,
            system_prompt: prompt::system_prompt_for_classification(catalog),
            min_confidence,
            call_timeout,
        }
    }
}

/// Clamp an untrusted verdict into the closed outcome set.
///
/// Keys outside the enumeration become `unknown`; a missing, non-numeric or
/// out-of-range confidence becomes 0. An `unknown` key always carries 0.
pub fn sanitize_verdict(raw: RawVerdict) -> ClassificationResult {
    let metric_key = match raw.metric_key.as_deref() {
        Some(key) => {
            let parsed = MetricKey::parse_lenient(key);
            if parsed.is_unknown() && !key.trim().eq_ignore_ascii_case("unknown") {
                tracing::warn!(metric_key = %key, "AI returned a metric key outside the enumeration");
            }
            parsed
        }
        None => MetricKey::Unknown,
    };

    let confidence = match raw.confidence {
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|c| c.is_finite() && (0.0..=1.0).contains(c))
            .unwrap_or(0.0),
        _ => 0.0,
    };

    let confidence = if metric_key.is_unknown() { 0.0 } else { confidence };

    ClassificationResult {
        metric_key,
        confidence,
        detection_layer: DetectionLayer::Ai,
        reasoning: Reasoning::Ai {
            rationale: raw.reasoning.unwrap_or_default().trim().to_string(),
        },
    }
}

#[async_trait]
impl Tier for AiTier {
    fn layer(&self) -> DetectionLayer {
        DetectionLayer::Ai
    }

    async fn attempt(&self, input: &TierInput<'_>) -> Result<Option<ClassificationResult>> {
        let payload = prompt::user_payload_for_classification(input.summary);
        let raw = timeout(
            self.call_timeout,
            self.reasoner.complete(&self.system_prompt, &payload),
        )
        .await??;

        let result = sanitize_verdict(raw);

        if result.metric_key.is_unknown() || result.confidence < self.min_confidence {
            tracing::debug!(
                metric_key = %result.metric_key,
                confidence = result.confidence,
                min_confidence = self.min_confidence,
                "AI verdict did not qualify"
            );
            return Ok(None);
        }

        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::outcome::ExecutionSummary;
    use crate::testing::{FailingReasoner, StubReasoner};
    use serde_json::json;

    fn verdict(key: &str, confidence: Value) -> RawVerdict {
        RawVerdict {
            metric_key: Some(key.to_string()),
            confidence: Some(confidence),
            reasoning: Some(" recipient and subject present ".to_string()),
        }
    }

    async fn run(reasoner: Arc<dyn Reasoner>) -> Result<Option<ClassificationResult>> {
        let tier = AiTier::new(
            reasoner,
            &Catalog::builtin(),
            0.5,
            Duration::from_millis(200),
        );
        let summary = ExecutionSummary::new().with("to", "a@b.com");
        let text = summary.describe();
        tier.attempt(&TierInput {
            summary: &summary,
            company_id: None,
            description: &text,
        })
        .await
    }

    #[test]
    fn test_sanitize_valid_verdict() {
        let result = sanitize_verdict(verdict("email_sent", json!(0.85)));
        assert_eq!(result.metric_key, MetricKey::EmailSent);
        assert!((result.confidence - 0.85).abs() < 1e-9);
        assert_eq!(result.detection_layer, DetectionLayer::Ai);
        assert_eq!(
            result.reasoning,
            Reasoning::Ai {
                rationale: "recipient and subject present".to_string()
            }
        );
    }

    #[test]
    fn test_sanitize_clamps_unknown_key() {
        let result = sanitize_verdict(verdict("not_a_real_outcome", json!(0.99)));
        assert_eq!(result.metric_key, MetricKey::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_sanitize_bad_confidence() {
        for confidence in [json!(1.7), json!(-0.2), json!("high"), Value::Null] {
            let result = sanitize_verdict(verdict("deal_won", confidence));
            assert_eq!(result.metric_key, MetricKey::DealWon);
            assert_eq!(result.confidence, 0.0);
        }
        let missing = sanitize_verdict(RawVerdict {
            metric_key: Some("deal_won".to_string()),
            ..RawVerdict::default()
        });
        assert_eq!(missing.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_confident_verdict_qualifies() {
        let result = run(Arc::new(StubReasoner::new(verdict("email_sent", json!(0.9)))))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.metric_key, MetricKey::EmailSent);
    }

    #[tokio::test]
    async fn test_low_confidence_does_not_qualify() {
        let result = run(Arc::new(StubReasoner::new(verdict("email_sent", json!(0.3)))))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_malformed_key_does_not_qualify() {
        let result = run(Arc::new(StubReasoner::new(verdict(
            "not_a_real_outcome",
            json!(0.95),
        ))))
        .await
        .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_reasoner_is_an_error() {
        let result = run(Arc::new(FailingReasoner)).await;
        assert!(matches!(result, Err(AppError::ExternalServiceUnavailable(_))));
    }
}
