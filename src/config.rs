use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct WebhookConfig {
    pub secret: String,
}

// Manual Debug impl to avoid leaking the webhook secret
impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Tunable thresholds for the detection tiers.
#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// Minimum cosine similarity for a learned description to decide the outcome.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Minimum fraction of expected fields for the heuristic tier.
    #[serde(default = "default_heuristic_min_score")]
    pub heuristic_min_score: f64,
    /// Minimum model-reported confidence for the AI tier.
    #[serde(default = "default_ai_min_confidence")]
    pub ai_min_confidence: f64,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Upper bound for every embedding, search and completion call.
    #[serde(default = "default_external_timeout_ms")]
    pub external_timeout_ms: u64,
}

impl ClassifierConfig {
    pub fn external_timeout(&self) -> Duration {
        Duration::from_millis(self.external_timeout_ms)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            heuristic_min_score: default_heuristic_min_score(),
            ai_min_confidence: default_ai_min_confidence(),
            search_limit: default_search_limit(),
            external_timeout_ms: default_external_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
    /// Offline feature hashing; no network access.
    Hashing,
}

#[derive(Deserialize, Clone)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProvider,
    pub api_key: Option<String>,
    #[serde(default = "default_embeddings_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            base_url: default_embeddings_base_url(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for EmbeddingsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingsConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct ClaudeConfig {
    /// When absent the AI tier is not installed.
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// JSON-lines file backing the description store. In-memory when unset.
    pub path: Option<PathBuf>,
    #[serde(default = "default_seed_on_startup")]
    pub seed_on_startup: bool,
    /// JSON-lines journal of classified executions. Defaults to
    /// `executions.jsonl` next to `path`; in-memory when neither is set.
    pub executions_path: Option<PathBuf>,
    /// Executions kept for confirmation, oldest dropped first.
    #[serde(default = "default_max_executions")]
    pub max_executions: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            seed_on_startup: default_seed_on_startup(),
            executions_path: None,
            max_executions: default_max_executions(),
        }
    }
}

impl StoreConfig {
    pub fn executions_path(&self) -> Option<PathBuf> {
        self.executions_path
            .clone()
            .or_else(|| self.path.as_ref().map(|p| p.with_file_name("executions.jsonl")))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_similarity_threshold() -> f64 {
    0.80
}

fn default_heuristic_min_score() -> f64 {
    0.5
}

fn default_ai_min_confidence() -> f64 {
    0.5
}

fn default_search_limit() -> usize {
    5
}

fn default_external_timeout_ms() -> u64 {
    5_000
}

fn default_embedding_provider() -> EmbeddingProvider {
    EmbeddingProvider::OpenAi
}

fn default_embeddings_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    512
}

fn default_seed_on_startup() -> bool {
    true
}

fn default_max_executions() -> usize {
    crate::store::executions::DEFAULT_MAX_EXECUTIONS
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(
                config::File::with_name("outcome-classifier").required(false),
            );
        }

        // Environment variable overrides with OUTCOME_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("OUTCOME")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let classifier = &self.classifier;
        for (name, value) in [
            ("similarity_threshold", classifier.similarity_threshold),
            ("heuristic_min_score", classifier.heuristic_min_score),
            ("ai_min_confidence", classifier.ai_min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "classifier.{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if classifier.external_timeout_ms == 0 {
            return Err(AppError::Config(
                "classifier.external_timeout_ms must be positive".to_string(),
            ));
        }

        if classifier.search_limit == 0 {
            return Err(AppError::Config(
                "classifier.search_limit must be positive".to_string(),
            ));
        }

        if self.embeddings.dimensions == 0 {
            return Err(AppError::Config(
                "embeddings.dimensions must be positive".to_string(),
            ));
        }

        if self.embeddings.provider == EmbeddingProvider::OpenAi
            && self.embeddings.api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(AppError::Config(
                "embeddings.api_key is required for the openai provider".to_string(),
            ));
        }

        if self.store.max_executions == 0 {
            return Err(AppError::Config(
                "store.max_executions must be positive".to_string(),
            ));
        }

        if let (Some(descriptions), Some(executions)) =
            (&self.store.path, self.store.executions_path())
        {
            if *descriptions == executions {
                return Err(AppError::Config(
                    "store.path and store.executions_path must differ".to_string(),
                ));
            }
        }

        if self.webhook.secret.is_empty() {
            return Err(AppError::Config("webhook.secret must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn webhook_secret(&self) -> &str {
        &self.webhook.secret
    }

    pub fn claude_api_key(&self) -> Option<&str> {
        self.claude.api_key.as_deref().filter(|k| !k.is_empty())
    }
}
