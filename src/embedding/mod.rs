pub mod hashing;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{EmbeddingProvider, EmbeddingsConfig};
use crate::error::{AppError, Result};

pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbedder;

/// Turns text into a fixed-length vector. Implementations must be
/// language-agnostic: English and Chinese text share one vector space.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;
}

/// Build the embedder selected in configuration.
pub fn from_config(config: &EmbeddingsConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::OpenAi => {
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| AppError::Config("embeddings.api_key is not set".to_string()))?;
            Ok(Arc::new(OpenAiEmbedder::new(
                api_key,
                &config.base_url,
                &config.model,
                config.dimensions,
            )))
        }
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
    }
}

/// Cosine similarity in [-1, 1]; 0 for mismatched or zero-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
