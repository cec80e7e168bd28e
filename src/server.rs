use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ai::claude::ClaudeClient;
use crate::ai::{ClaudeReasoner, Reasoner};
use crate::classifier::OutcomeClassifier;
use crate::config::AppConfig;
use crate::embedding;
use crate::outcome::Catalog;
use crate::store::{DescriptionStore, ExecutionLog, JsonlStore, MemoryStore};
use crate::webhook::handler;

pub struct AppState {
    pub config: AppConfig,
    pub classifier: OutcomeClassifier,
}

impl AppState {
    pub async fn new(config: AppConfig) -> crate::error::Result<Self> {
        let embedder = embedding::from_config(&config.embeddings)?;

        let store: Arc<dyn DescriptionStore> = match &config.store.path {
            Some(path) => Arc::new(JsonlStore::open(path, embedder.dimensions()).await?),
            None => {
                tracing::info!("Using in-memory description store");
                Arc::new(MemoryStore::new(embedder.dimensions()))
            }
        };

        let reasoner: Option<Arc<dyn Reasoner>> = match config.claude_api_key() {
            Some(api_key) => Some(Arc::new(ClaudeReasoner::new(ClaudeClient::new(
                api_key,
                &config.claude.model,
                config.claude.max_tokens,
            )))),
            None => {
                tracing::warn!("claude.api_key not set; AI tier disabled");
                None
            }
        };

        let executions = match config.store.executions_path() {
            Some(path) => ExecutionLog::open(&path, config.store.max_executions).await?,
            None => ExecutionLog::with_capacity(config.store.max_executions),
        };

        let classifier = OutcomeClassifier::new(
            &config.classifier,
            Arc::new(Catalog::builtin()),
            embedder,
            store,
            Arc::new(executions),
            reasoner,
        );

        tracing::info!(tiers = ?classifier.tier_layers(), "Classifier ready");

        if config.store.seed_on_startup {
            classifier.seed().await?;
        }

        Ok(Self { config, classifier })
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/executions", post(handler::handle_execution))
        .route("/executions/:id/confirm", post(handler::handle_confirm))
        .route("/executions/:id", get(handler::get_execution))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::outcome::{ExecutionSummary, MetricKey};
    use crate::store::DescriptionSource;
    use crate::testing::test_config;

    #[tokio::test]
    async fn test_state_seeds_on_startup() {
        let state = AppState::new(test_config(StoreConfig::default()))
            .await
            .unwrap();
        let store = state.classifier.store();
        let seeded = store.count_by_source(DescriptionSource::System).await.unwrap();
        assert_eq!(seeded, Catalog::builtin().seeds().len());
        assert_eq!(state.classifier.tier_layers().len(), 2);
    }

    #[tokio::test]
    async fn test_state_skips_seeding_when_disabled() {
        let state = AppState::new(test_config(StoreConfig {
            path: None,
            seed_on_startup: false,
            ..StoreConfig::default()
        }))
        .await
        .unwrap();
        assert_eq!(state.classifier.store().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_jsonl_store_is_seeded_once_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let store_config = StoreConfig {
            path: Some(dir.path().join("descriptions.jsonl")),
            seed_on_startup: true,
            ..StoreConfig::default()
        };

        let first = AppState::new(test_config(store_config.clone())).await.unwrap();
        let rows = first.classifier.store().len().await.unwrap();
        assert!(rows > 0);
        drop(first);

        let second = AppState::new(test_config(store_config)).await.unwrap();
        assert_eq!(second.classifier.store().len().await.unwrap(), rows);
    }

    #[tokio::test]
    async fn test_execution_can_be_confirmed_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let store_config = StoreConfig {
            path: Some(dir.path().join("descriptions.jsonl")),
            seed_on_startup: false,
            ..StoreConfig::default()
        };
        let summary = ExecutionSummary::new()
            .with("deal_id", "D-1")
            .with("deal_value", 9000_i64);

        let first = AppState::new(test_config(store_config.clone())).await.unwrap();
        first
            .classifier
            .classify_execution("ex1", summary, Some("c1"))
            .await
            .unwrap();
        drop(first);

        let second = AppState::new(test_config(store_config)).await.unwrap();
        second
            .classifier
            .confirm("ex1", MetricKey::DealWon, None, None)
            .await
            .unwrap();

        let record = second.classifier.executions().get("ex1").await.unwrap();
        assert_eq!(record.confirmed_metric_key, Some(MetricKey::DealWon));
        assert_eq!(record.company_id.as_deref(), Some("c1"));
        assert!(dir.path().join("executions.jsonl").exists());
    }
}
