pub mod claude;
pub mod prompt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};

use claude::{ClaudeClient, Message, MessagesRequest};

/// The model's answer, exactly as returned. Nothing here is trusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVerdict {
    #[serde(default)]
    pub metric_key: Option<String>,
    #[serde(default)]
    pub confidence: Option<Value>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Opaque text-reasoning capability used as the last classification tier.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_payload: &Value) -> Result<RawVerdict>;
}

/// `Reasoner` backed by the Claude Messages API.
pub struct ClaudeReasoner {
    client: ClaudeClient,
}

impl ClaudeReasoner {
    pub fn new(client: ClaudeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reasoner for ClaudeReasoner {
    async fn complete(&self, system_prompt: &str, user_payload: &Value) -> Result<RawVerdict> {
        let request = MessagesRequest {
            model: self.client.model().to_string(),
            max_tokens: self.client.max_tokens(),
            system: system_prompt.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: serde_json::to_string_pretty(user_payload)?,
            }],
            temperature: Some(0.0),
        };

        let response = self.client.send_message(&request).await?;

        tracing::debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "Claude response"
        );

        parse_verdict(&response.text())
    }
}

/// Pull the first JSON object out of a model reply, tolerating code fences
/// and surrounding prose.
pub fn parse_verdict(text: &str) -> Result<RawVerdict> {
    let mut last_error = None;

    for (start, _) in text.match_indices('{') {
        let mut values =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<RawVerdict>();
        match values.next() {
            Some(Ok(verdict)) => return Ok(verdict),
            Some(Err(e)) => last_error = Some(e),
            None => {}
        }
    }

    Err(AppError::AiResponseMalformed(match last_error {
        Some(e) => format!("invalid verdict JSON: {e}"),
        None => format!("no JSON object in reply: {text}"),
    }))
}
