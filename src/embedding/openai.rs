use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::embedding::Embedder;
use crate::error::{AppError, Result};

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, base_url: &str, model: &str, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimensions,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceUnavailable(format!("embeddings: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalServiceUnavailable(format!(
                "embeddings API returned {status}: {body}"
            )));
        }

        let body = response.json::<EmbeddingResponse>().await?;
        extract_embedding(body, self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn extract_embedding(body: EmbeddingResponse, dimensions: usize) -> Result<Vec<f32>> {
    let embedding = body
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| AppError::Embedding("No embeddings returned".to_string()))?;

    if embedding.len() != dimensions {
        return Err(AppError::Embedding(format!(
            "expected {dimensions} dimensions, got {}",
            embedding.len()
        )));
    }

    Ok(embedding)
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
