//! Test doubles for the external services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::ai::{RawVerdict, Reasoner};
use crate::classifier::{Tier, TierInput};
use crate::config::{
    AppConfig, ClassifierConfig, ClaudeConfig, EmbeddingProvider, EmbeddingsConfig, ServerConfig,
    StoreConfig, WebhookConfig,
};
use crate::embedding::{Embedder, HashingEmbedder};
use crate::error::{AppError, Result};
use crate::outcome::{ClassificationResult, DetectionLayer, MetricKey};
use crate::store::{DescriptionSource, Language, OutcomeDescription};

pub fn description(
    metric_key: MetricKey,
    embedding: Vec<f32>,
    company_id: Option<&str>,
) -> OutcomeDescription {
    OutcomeDescription {
        metric_key,
        text: format!("example of {metric_key}"),
        language: Language::En,
        source: DescriptionSource::UserConfirmed,
        company_id: company_id.map(str::to_string),
        embedding,
        created_at: Utc::now(),
    }
}

/// Returns the same vector for any text.
pub struct StaticEmbedder {
    vector: Vec<f32>,
}

impl StaticEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

pub struct SlowEmbedder {
    vector: Vec<f32>,
    delay: Duration,
}

impl SlowEmbedder {
    pub fn new(vector: Vec<f32>, delay: Duration) -> Self {
        Self { vector, delay }
    }
}

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.vector.clone())
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AppError::ExternalServiceUnavailable(
            "embeddings offline".to_string(),
        ))
    }

    fn dimensions(&self) -> usize {
        2
    }
}

/// Hashing embedder that fails after a number of successful calls until
/// restored.
pub struct FlakyEmbedder {
    inner: HashingEmbedder,
    successes_left: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(dimensions: usize, successes: usize) -> Self {
        Self {
            inner: HashingEmbedder::new(dimensions),
            successes_left: AtomicUsize::new(successes),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn restore(&self) {
        self.successes_left.store(usize::MAX, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let allowed = self
            .successes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if allowed {
            Ok(self.inner.embed_sync(text))
        } else {
            Err(AppError::ExternalServiceUnavailable(
                "embeddings offline".to_string(),
            ))
        }
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

pub struct StubReasoner {
    verdict: RawVerdict,
}

impl StubReasoner {
    pub fn new(verdict: RawVerdict) -> Self {
        Self { verdict }
    }
}

#[async_trait]
impl Reasoner for StubReasoner {
    async fn complete(&self, _system_prompt: &str, _user_payload: &Value) -> Result<RawVerdict> {
        Ok(self.verdict.clone())
    }
}

pub struct CountingReasoner {
    verdict: RawVerdict,
    calls: AtomicUsize,
}

impl CountingReasoner {
    pub fn new(verdict: RawVerdict) -> Self {
        Self {
            verdict,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for CountingReasoner {
    async fn complete(&self, _system_prompt: &str, _user_payload: &Value) -> Result<RawVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict.clone())
    }
}

pub struct FailingReasoner;

#[async_trait]
impl Reasoner for FailingReasoner {
    async fn complete(&self, _system_prompt: &str, _user_payload: &Value) -> Result<RawVerdict> {
        Err(AppError::ExternalServiceUnavailable(
            "Claude API unreachable".to_string(),
        ))
    }
}

/// Tier with a canned answer that counts how often it ran.
pub struct CountingTier {
    layer: DetectionLayer,
    result: Option<ClassificationResult>,
    calls: Arc<AtomicUsize>,
}

impl CountingTier {
    pub fn new(layer: DetectionLayer, result: Option<ClassificationResult>) -> Self {
        Self {
            layer,
            result,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Tier for CountingTier {
    fn layer(&self) -> DetectionLayer {
        self.layer
    }

    async fn attempt(&self, _input: &TierInput<'_>) -> Result<Option<ClassificationResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

/// Offline configuration: hashing embedder, no AI tier.
pub fn test_config(store: StoreConfig) -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        webhook: WebhookConfig {
            secret: TEST_SECRET.to_string(),
        },
        classifier: ClassifierConfig::default(),
        embeddings: EmbeddingsConfig {
            provider: EmbeddingProvider::Hashing,
            dimensions: 1024,
            ..EmbeddingsConfig::default()
        },
        claude: ClaudeConfig::default(),
        store,
    }
}

pub const TEST_SECRET: &str = "test-secret";
