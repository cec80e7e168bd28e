pub mod executions;
pub mod jsonl;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::outcome::MetricKey;

pub use executions::{ExecutionLog, ExecutionRecord};
pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

/// Language tag kept for bookkeeping. Never consulted when classifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Zh,
    Mixed,
}

impl Language {
    /// `Zh` when the text has CJK ideographs only, `Mixed` when it also has
    /// Latin letters, `En` otherwise.
    pub fn detect(text: &str) -> Language {
        let has_cjk = text.chars().any(is_cjk);
        let has_latin = text.chars().any(|c| c.is_ascii_alphabetic());
        match (has_cjk, has_latin) {
            (true, true) => Language::Mixed,
            (true, false) => Language::Zh,
            (false, _) => Language::En,
        }
    }
}

pub fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionSource {
    /// Shipped with the catalog.
    System,
    /// Added when a human confirmed or corrected a classification.
    UserConfirmed,
}

/// A stored example sentence for one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDescription {
    pub metric_key: MetricKey,
    pub text: String,
    pub language: Language,
    pub source: DescriptionSource,
    /// `None` applies to every tenant.
    pub company_id: Option<String>,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl OutcomeDescription {
    /// Whether a search on behalf of `company_id` may see this row.
    pub fn visible_to(&self, company_id: Option<&str>) -> bool {
        match (&self.company_id, company_id) {
            (None, _) => true,
            (Some(owner), Some(requester)) => owner == requester,
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredDescription {
    pub description: OutcomeDescription,
    pub similarity: f64,
}

/// Append-only persistence for learned descriptions.
///
/// Rows are never updated or deleted; searches may run concurrently with
/// appends.
#[async_trait]
pub trait DescriptionStore: Send + Sync {
    /// Store a new row. Fails if the embedding length differs from `dimensions()`.
    async fn append(&self, description: OutcomeDescription) -> Result<()>;

    /// Nearest rows visible to `company_id`, most similar first.
    async fn search(
        &self,
        embedding: &[f32],
        company_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScoredDescription>>;

    async fn len(&self) -> Result<usize>;

    async fn count_by_source(&self, source: DescriptionSource) -> Result<usize>;

    /// Text of every row from `source`, in insertion order.
    async fn texts_by_source(&self, source: DescriptionSource) -> Result<Vec<String>>;

    fn dimensions(&self) -> usize;
}
