//! Static lookup tables for the canonical outcomes.
//!
//! Built once at startup and shared read-only. Learned descriptions never
//! land here; they go to the description store.

use crate::outcome::MetricKey;
use crate::store::Language;

/// Fields whose presence signals each outcome, in `MetricKey::CANONICAL` order.
const EXPECTED_FIELDS: [(MetricKey, &[&str]); 6] = [
    (
        MetricKey::MeetingBooked,
        &["scheduled_time", "contact_email", "contact_name"],
    ),
    (
        MetricKey::LeadCreated,
        &["lead_id", "contact_email", "lead_source"],
    ),
    (
        MetricKey::TicketCreated,
        &["ticket_id", "subject", "priority"],
    ),
    (
        MetricKey::TicketResolved,
        &["ticket_id", "status", "resolved_at"],
    ),
    (
        MetricKey::EmailSent,
        &["recipient", "subject", "message_id"],
    ),
    (MetricKey::DealWon, &["deal_id", "deal_value", "closed_at"]),
];

const DEFINITIONS: [(MetricKey, &str); 7] = [
    (
        MetricKey::MeetingBooked,
        "A meeting, call or appointment was scheduled with a contact.",
    ),
    (
        MetricKey::LeadCreated,
        "A new prospect or lead was captured in the CRM.",
    ),
    (
        MetricKey::TicketCreated,
        "A support ticket or help-desk case was opened.",
    ),
    (
        MetricKey::TicketResolved,
        "An existing support ticket was closed or resolved.",
    ),
    (
        MetricKey::EmailSent,
        "An email or message was delivered to a recipient.",
    ),
    (
        MetricKey::DealWon,
        "A sales deal or contract was closed as won.",
    ),
    (
        MetricKey::Unknown,
        "None of the above; the run's business result cannot be determined.",
    ),
];

const SEED_DESCRIPTIONS: &[(MetricKey, &str)] = &[
    (MetricKey::MeetingBooked, "A prospect booked a demo call on the calendar"),
    (MetricKey::MeetingBooked, "Customer scheduled a consultation appointment"),
    (MetricKey::MeetingBooked, "客户预约了会议"),
    (MetricKey::MeetingBooked, "新的 Calendly meeting 已预约"),
    (MetricKey::LeadCreated, "New lead captured from the website contact form"),
    (MetricKey::LeadCreated, "A prospect was added to the CRM as a new lead"),
    (MetricKey::LeadCreated, "新增潜在客户线索"),
    (MetricKey::TicketCreated, "Customer opened a new support ticket"),
    (MetricKey::TicketCreated, "A help desk case was created from an inbound email"),
    (MetricKey::TicketCreated, "客户提交了新的工单"),
    (MetricKey::TicketResolved, "Support ticket was marked as resolved"),
    (MetricKey::TicketResolved, "The agent closed the customer's case"),
    (MetricKey::TicketResolved, "工单已解决并关闭"),
    (MetricKey::EmailSent, "Follow-up email was sent to the contact"),
    (MetricKey::EmailSent, "Newsletter delivered to the subscriber list"),
    (MetricKey::EmailSent, "已向客户发送邮件"),
    (MetricKey::DealWon, "Deal closed won and the contract was signed"),
    (MetricKey::DealWon, "Client signed the proposal and paid the invoice"),
    (MetricKey::DealWon, "销售 deal 已成交"),
];

/// A built-in example description for one outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedDescription {
    pub metric_key: MetricKey,
    pub text: String,
    pub language: Language,
}

/// Immutable outcome configuration.
#[derive(Debug, Clone)]
pub struct Catalog {
    expected: Vec<(MetricKey, Vec<String>)>,
    seeds: Vec<SeedDescription>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let expected = EXPECTED_FIELDS
            .iter()
            .map(|(key, fields)| (*key, fields.iter().map(|f| f.to_string()).collect()))
            .collect();

        let seeds = SEED_DESCRIPTIONS
            .iter()
            .map(|(key, text)| SeedDescription {
                metric_key: *key,
                text: text.to_string(),
                language: Language::detect(text),
            })
            .collect();

        Self { expected, seeds }
    }

    /// Expected fields per outcome, in tie-break priority order.
    pub fn expected_fields(&self) -> impl Iterator<Item = (MetricKey, &[String])> {
        self.expected.iter().map(|(key, fields)| (*key, fields.as_slice()))
    }

    pub fn expected_fields_for(&self, key: MetricKey) -> &[String] {
        self.expected
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, fields)| fields.as_slice())
            .unwrap_or(&[])
    }

    pub fn definition(&self, key: MetricKey) -> &'static str {
        DEFINITIONS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, d)| *d)
            .unwrap_or("")
    }

    /// `key: definition` lines for every outcome including `unknown`.
    pub fn definitions(&self) -> Vec<(MetricKey, &'static str)> {
        DEFINITIONS.to_vec()
    }

    pub fn seeds(&self) -> &[SeedDescription] {
        &self.seeds
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
