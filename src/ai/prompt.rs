use serde_json::{json, Value};

use crate::outcome::{Catalog, ExecutionSummary};

pub fn system_prompt_for_classification(catalog: &Catalog) -> String {
    let outcomes = catalog
        .definitions()
        .into_iter()
        .map(|(key, definition)| format!("- `{key}`: {definition}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You classify the business outcome of an automation workflow run.

You receive the fields extracted from one workflow execution. Field names and values may be in English, Chinese or both.

## Outcomes
{outcomes}

## Instructions
1. Decide which single outcome the execution achieved.
2. Use `unknown` when the fields do not support any outcome.
3. Rate your confidence between 0 and 1.

## Response format
Reply with one JSON object and nothing else:
{{"metric_key": "<one of the outcomes above>", "confidence": <number between 0 and 1>, "reasoning": "<one short sentence>"}}"#
    )
}

pub fn user_payload_for_classification(summary: &ExecutionSummary) -> Value {
    json!({
        "execution_fields": summary,
        "description": summary.describe(),
    })
}
