use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("External service unavailable: {0}")]
    ExternalServiceUnavailable(String),

    #[error("AI response malformed: {0}")]
    AiResponseMalformed(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Claude API error: {0}")]
    ClaudeApi(String),

    #[error("Description store error: {0}")]
    Store(String),

    #[error("Webhook verification failed: {0}")]
    WebhookVerification(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Failures of a backing service rather than of the caller's request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::ExternalServiceUnavailable(_)
                | AppError::AiResponseMalformed(_)
                | AppError::Embedding(_)
                | AppError::ClaudeApi(_)
                | AppError::Http(_)
        )
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        AppError::ExternalServiceUnavailable(format!("timed out: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
