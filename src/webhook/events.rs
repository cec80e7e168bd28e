use serde::{Deserialize, Serialize};

use crate::outcome::summary::{WORKFLOW_DESCRIPTION_FIELD, WORKFLOW_NAME_FIELD};
use crate::outcome::{ClassificationResult, ExecutionSummary};

/// Payload sent when a workflow execution finishes.
#[derive(Debug, Deserialize)]
pub struct ExecutionEvent {
    pub execution_id: String,
    pub company_id: Option<String>,
    pub workflow_name: Option<String>,
    pub workflow_description: Option<String>,
    #[serde(default)]
    pub summary: ExecutionSummary,
}

impl ExecutionEvent {
    pub fn parse(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// The summary with top-level workflow identity folded in, unless the
    /// summary already carries those fields.
    pub fn into_summary(self) -> ExecutionSummary {
        let mut summary = self.summary;
        for (field, value) in [
            (WORKFLOW_NAME_FIELD, self.workflow_name),
            (WORKFLOW_DESCRIPTION_FIELD, self.workflow_description),
        ] {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                if summary.get(field).is_none() {
                    summary.insert(field, value);
                }
            }
        }
        summary
    }
}

/// Payload sent when a human confirms or corrects a classification.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub metric_key: String,
    pub custom_description: Option<String>,
    pub company_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub execution_id: String,
    #[serde(flatten)]
    pub result: ClassificationResult,
    pub explanation: String,
}

impl ClassificationResponse {
    pub fn new(execution_id: String, result: ClassificationResult) -> Self {
        Self {
            explanation: result.explanation(),
            execution_id,
            result,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
