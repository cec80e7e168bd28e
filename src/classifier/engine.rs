use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;

use crate::ai::Reasoner;
use crate::classifier::{AiTier, HeuristicTier, Tier, TierInput, VectorTier};
use crate::config::ClassifierConfig;
use crate::embedding::Embedder;
use crate::error::{AppError, Result};
use crate::outcome::{Catalog, ClassificationResult, DetectionLayer, ExecutionSummary, MetricKey};
use crate::store::{
    DescriptionSource, DescriptionStore, ExecutionLog, ExecutionRecord, Language,
    OutcomeDescription,
};

/// Runs the detection tiers in order and owns the feedback loop.
pub struct OutcomeClassifier {
    tiers: Vec<Box<dyn Tier>>,
    catalog: Arc<Catalog>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DescriptionStore>,
    executions: Arc<ExecutionLog>,
    call_timeout: Duration,
}

impl OutcomeClassifier {
    /// Standard chain: vector similarity, field heuristic, then AI when a
    /// reasoner is available.
    pub fn new(
        config: &ClassifierConfig,
        catalog: Arc<Catalog>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DescriptionStore>,
        executions: Arc<ExecutionLog>,
        reasoner: Option<Arc<dyn Reasoner>>,
    ) -> Self {
        let call_timeout = config.external_timeout();

        let mut tiers: Vec<Box<dyn Tier>> = vec![
            Box::new(VectorTier::new(
                Arc::clone(&embedder),
                Arc::clone(&store),
                config.similarity_threshold,
                config.search_limit,
                call_timeout,
            )),
            Box::new(HeuristicTier::new(
                Arc::clone(&catalog),
                config.heuristic_min_score,
            )),
        ];

        if let Some(reasoner) = reasoner {
            tiers.push(Box::new(AiTier::new(
                reasoner,
                &catalog,
                config.ai_min_confidence,
                call_timeout,
            )));
        }

        Self::with_tiers(tiers, catalog, embedder, store, executions, call_timeout)
    }

    /// Explicit tier list, tried in the given order.
    pub fn with_tiers(
        tiers: Vec<Box<dyn Tier>>,
        catalog: Arc<Catalog>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DescriptionStore>,
        executions: Arc<ExecutionLog>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            tiers,
            catalog,
            embedder,
            store,
            executions,
            call_timeout,
        }
    }

    pub fn tier_layers(&self) -> Vec<DetectionLayer> {
        self.tiers.iter().map(|t| t.layer()).collect()
    }

    pub fn executions(&self) -> &ExecutionLog {
        &self.executions
    }

    pub fn store(&self) -> &Arc<dyn DescriptionStore> {
        &self.store
    }

    /// Decide the outcome of one execution.
    ///
    /// Fails only on an empty summary. Tier failures fall through to the
    /// next tier and the result is `unknown` when nothing qualifies.
    pub async fn classify(
        &self,
        summary: &ExecutionSummary,
        company_id: Option<&str>,
    ) -> Result<ClassificationResult> {
        summary.validate()?;

        let description = summary.describe();
        let input = TierInput {
            summary,
            company_id,
            description: &description,
        };

        for tier in &self.tiers {
            match tier.attempt(&input).await {
                Ok(Some(result)) if !result.metric_key.is_unknown() => {
                    tracing::info!(
                        metric_key = %result.metric_key,
                        confidence = result.confidence,
                        detection_layer = %result.detection_layer,
                        "Execution classified"
                    );
                    return Ok(result);
                }
                Ok(_) => {
                    tracing::debug!(layer = %tier.layer(), "Tier did not qualify");
                }
                Err(e) => {
                    tracing::warn!(layer = %tier.layer(), error = %e, "Tier skipped");
                }
            }
        }

        let result = ClassificationResult::unknown(summary.present_fields());
        tracing::info!(
            metric_key = %result.metric_key,
            detection_layer = %result.detection_layer,
            "No tier qualified"
        );
        Ok(result)
    }

    /// Classify and keep the result so the execution can be confirmed later.
    pub async fn classify_execution(
        &self,
        execution_id: &str,
        summary: ExecutionSummary,
        company_id: Option<&str>,
    ) -> Result<ClassificationResult> {
        let result = self.classify(&summary, company_id).await?;
        self.executions
            .record(ExecutionRecord::new(
                execution_id,
                company_id,
                summary,
                result.clone(),
            ))
            .await?;
        Ok(result)
    }

    /// Record a human's chosen outcome and learn from it.
    ///
    /// The confirmation itself is persisted before the description is
    /// embedded; an embedding failure is returned after that point and leaves
    /// the description store untouched.
    pub async fn confirm(
        &self,
        execution_id: &str,
        confirmed: MetricKey,
        custom_description: Option<&str>,
        company_id: Option<&str>,
    ) -> Result<()> {
        if confirmed.is_unknown() {
            return Err(AppError::InvalidInput(
                "cannot confirm an execution as unknown".to_string(),
            ));
        }

        let record = self.executions.confirm(execution_id, confirmed).await?;
        let company_id = company_id
            .map(str::to_string)
            .or_else(|| record.company_id.clone());

        let text = confirmation_text(&record.summary, custom_description);

        let embedding = match self.embed_bounded(&text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(
                    execution_id,
                    error = %e,
                    "Confirmation saved without a learned description"
                );
                return Err(AppError::ExternalServiceUnavailable(format!(
                    "confirmation saved, embedding failed: {e}"
                )));
            }
        };

        let description = OutcomeDescription {
            metric_key: confirmed,
            language: Language::detect(&text),
            text,
            source: DescriptionSource::UserConfirmed,
            company_id,
            embedding,
            created_at: Utc::now(),
        };

        tracing::info!(
            execution_id,
            metric_key = %confirmed,
            language = ?description.language,
            company_id = ?description.company_id,
            "Learned description from confirmation"
        );

        self.store.append(description).await
    }

    /// Embed and store the catalog's system descriptions that are not yet in
    /// the store.
    ///
    /// Returns how many were added. Stops at the first embedding failure so
    /// an unreachable service costs one timeout; the rest are picked up by
    /// the next call.
    pub async fn seed(&self) -> Result<usize> {
        let existing: HashSet<String> = self
            .store
            .texts_by_source(DescriptionSource::System)
            .await?
            .into_iter()
            .collect();

        let pending: Vec<_> = self
            .catalog
            .seeds()
            .iter()
            .filter(|seed| !existing.contains(&seed.text))
            .collect();
        if pending.is_empty() {
            tracing::info!(existing = existing.len(), "System descriptions already seeded");
            return Ok(0);
        }

        let mut added = 0;
        for seed in &pending {
            let embedding = match self.embed_bounded(&seed.text).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    tracing::warn!(
                        added,
                        remaining = pending.len() - added,
                        error = %e,
                        "Seeding interrupted by embedding failure"
                    );
                    return Ok(added);
                }
            };

            self.store
                .append(OutcomeDescription {
                    metric_key: seed.metric_key,
                    text: seed.text.clone(),
                    language: seed.language,
                    source: DescriptionSource::System,
                    company_id: None,
                    embedding,
                    created_at: Utc::now(),
                })
                .await?;
            added += 1;
        }

        tracing::info!(added, total = self.catalog.seeds().len(), "Seeded system descriptions");
        Ok(added)
    }

    async fn embed_bounded(&self, text: &str) -> Result<Vec<f32>> {
        timeout(self.call_timeout, self.embedder.embed(text)).await?
    }
}

fn confirmation_text(summary: &ExecutionSummary, custom_description: Option<&str>) -> String {
    let base = summary.describe();
    match custom_description.map(str::trim).filter(|c| !c.is_empty()) {
        Some(custom) if base.is_empty() => custom.to_string(),
        Some(custom) => format!("{base}. {custom}"),
        None => base,
    }
}
