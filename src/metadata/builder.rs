//! Turns raw ingestion inputs into a [`MetadataRecord`].
//!
//! Ingestion is permissive: malformed metadata text or an unparseable budget
//! degrades to an empty field instead of failing the request. Every
//! coercion here returns an `Option` and none of them can error.

use serde_json::Value;

use super::MetadataRecord;

/// Parse metadata text as JSON, or `None` if it is not valid JSON.
pub fn parse_metadata_text(raw: &str) -> Option<Value> {
    serde_json::from_str(raw).ok()
}

/// Parse a budget given as text. Non-finite values are rejected.
pub fn parse_budget(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|b| b.is_finite())
}

/// Coerce a JSON value found under a `budget` key into a float.
pub fn coerce_budget_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|b| b.is_finite()),
        Value::String(s) => parse_budget(s),
        _ => None,
    }
}

fn coerce_status_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

/// Build the metadata record for one ingestion.
///
/// Empty strings count as absent. An explicit budget or status hint wins
/// over the `budget`/`status` keys of a JSON-object metadata text; a budget
/// hint that does not parse is treated as if it had not been given.
pub fn build_metadata(
    raw_metadata: Option<&str>,
    budget_hint: Option<&str>,
    reference_id: Option<&str>,
    status_hint: Option<&str>,
) -> MetadataRecord {
    let raw = non_empty(raw_metadata);
    let parsed = raw.and_then(parse_metadata_text);

    let fields = match &parsed {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };

    let parsed_metadata = match (fields, raw) {
        (Some(map), _) => Some(Value::Object(map.clone())),
        (None, Some(text)) => Some(Value::String(text.to_string())),
        (None, None) => None,
    };

    let budget = non_empty(budget_hint)
        .and_then(parse_budget)
        .or_else(|| fields.and_then(|m| m.get("budget")).and_then(coerce_budget_value));

    let status = match non_empty(status_hint) {
        Some(hint) => Some(hint.to_string()),
        None => fields
            .and_then(|m| m.get("status"))
            .and_then(coerce_status_value),
    };

    MetadataRecord {
        raw_metadata: raw.map(str::to_string),
        parsed_metadata,
        budget,
        status,
        reference_id: non_empty(reference_id).map(str::to_string),
    }
}
