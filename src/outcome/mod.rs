pub mod catalog;
pub mod summary;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub use catalog::Catalog;
pub use summary::{ExecutionSummary, FieldValue};

/// Canonical business outcome of a workflow execution.
///
/// Declaration order is the priority order used to break heuristic ties:
/// an earlier variant wins over a later one with the same score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    MeetingBooked,
    LeadCreated,
    TicketCreated,
    TicketResolved,
    EmailSent,
    DealWon,
    Unknown,
}

impl MetricKey {
    /// Every outcome a classification can decide on, in priority order.
    pub const CANONICAL: [MetricKey; 6] = [
        MetricKey::MeetingBooked,
        MetricKey::LeadCreated,
        MetricKey::TicketCreated,
        MetricKey::TicketResolved,
        MetricKey::EmailSent,
        MetricKey::DealWon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::MeetingBooked => "meeting_booked",
            MetricKey::LeadCreated => "lead_created",
            MetricKey::TicketCreated => "ticket_created",
            MetricKey::TicketResolved => "ticket_resolved",
            MetricKey::EmailSent => "email_sent",
            MetricKey::DealWon => "deal_won",
            MetricKey::Unknown => "unknown",
        }
    }

    /// Parse an untrusted key, mapping anything outside the enumeration to `Unknown`.
    pub fn parse_lenient(raw: &str) -> MetricKey {
        raw.parse().unwrap_or(MetricKey::Unknown)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, MetricKey::Unknown)
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        MetricKey::CANONICAL
            .iter()
            .chain(std::iter::once(&MetricKey::Unknown))
            .find(|k| k.as_str() == normalized)
            .copied()
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown metric key: {s}")))
    }
}

/// Which tier produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionLayer {
    VectorSemantic,
    Heuristic,
    Ai,
    Unknown,
}

impl DetectionLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionLayer::VectorSemantic => "vector_semantic",
            DetectionLayer::Heuristic => "heuristic",
            DetectionLayer::Ai => "ai",
            DetectionLayer::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DetectionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence behind a classification, enough to explain it to a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reasoning {
    VectorMatch {
        matched_description: String,
        similarity: f64,
    },
    FieldMatch {
        expected: Vec<String>,
        found: Vec<String>,
        missing: Vec<String>,
    },
    Ai {
        rationale: String,
    },
    NoMatch {
        fields_present: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub metric_key: MetricKey,
    pub confidence: f64,
    pub detection_layer: DetectionLayer,
    pub reasoning: Reasoning,
}

impl ClassificationResult {
    /// The fallback result when no tier qualifies.
    pub fn unknown(fields_present: Vec<String>) -> Self {
        Self {
            metric_key: MetricKey::Unknown,
            confidence: 0.0,
            detection_layer: DetectionLayer::Unknown,
            reasoning: Reasoning::NoMatch { fields_present },
        }
    }

    /// Human-readable rendering of the reasoning payload.
    pub fn explanation(&self) -> String {
        match &self.reasoning {
            Reasoning::VectorMatch {
                matched_description,
                similarity,
            } => format!(
                "Matched \"{matched_description}\" ({:.0}% similar)",
                similarity * 100.0
            ),
            Reasoning::FieldMatch {
                expected,
                found,
                missing,
            } => {
                let missing = if missing.is_empty() {
                    "none".to_string()
                } else {
                    missing.join(", ")
                };
                format!(
                    "Found {}/{} expected fields for {} (found: {}; missing: {missing})",
                    found.len(),
                    expected.len(),
                    self.metric_key,
                    found.join(", ")
                )
            }
            Reasoning::Ai { rationale } => rationale.clone(),
            Reasoning::NoMatch { fields_present } => {
                if fields_present.is_empty() {
                    "No pattern matched.".to_string()
                } else {
                    format!(
                        "No pattern matched. Fields present: {}",
                        fields_present.join(", ")
                    )
                }
            }
        }
    }
}
