use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::embedding::cosine_similarity;
use crate::error::{AppError, Result};
use crate::store::{DescriptionSource, DescriptionStore, OutcomeDescription, ScoredDescription};

/// In-process description store.
pub struct MemoryStore {
    dimensions: usize,
    entries: RwLock<Vec<OutcomeDescription>>,
}

impl MemoryStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn check_dimensions(&self, description: &OutcomeDescription) -> Result<()> {
        if description.embedding.len() != self.dimensions {
            return Err(AppError::Store(format!(
                "embedding has {} dimensions, store expects {}",
                description.embedding.len(),
                self.dimensions
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DescriptionStore for MemoryStore {
    async fn append(&self, description: OutcomeDescription) -> Result<()> {
        self.check_dimensions(&description)?;
        self.entries.write().await.push(description);
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        company_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScoredDescription>> {
        let entries = self.entries.read().await;

        let mut scored: Vec<(usize, f64)> = entries
            .iter()
            .enumerate()
            .filter(|(_, d)| d.visible_to(company_id))
            .map(|(i, d)| (i, cosine_similarity(embedding, &d.embedding)))
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(i, similarity)| ScoredDescription {
                description: entries[i].clone(),
                similarity,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn count_by_source(&self, source: DescriptionSource) -> Result<usize> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|d| d.source == source)
            .count())
    }

    async fn texts_by_source(&self, source: DescriptionSource) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|d| d.source == source)
            .map(|d| d.text.clone())
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
