//! Usage detail collection - flattens the proxy's nested usage snapshot
//!
//! The `/usage` endpoint returns
//! `{ "usage": { "apis": { api: { "models": { model: { "details": [...] } } } } } }`
//! where every detail is one request outcome. Any level may be missing or
//! mistyped; such branches simply contribute nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identity::auth_index_field;
use super::timestamp::parse_timestamp;

/// Outcome of one proxied request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// One observed request outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageDetail {
    /// Raw API key, masked key, or auth file name
    pub source: String,

    /// Normalized auth index, if the backend reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_index: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub outcome: Outcome,

    /// Model the detail was recorded under
    pub model: String,
}

impl UsageDetail {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Flatten a usage snapshot into a chronologically ordered list of details
///
/// Accepts either the full response (`{usage: {...}}`) or the inner usage
/// object. Details without a parseable timestamp are dropped. Ties keep
/// traversal order, and object keys are traversed in sorted order, so the
/// result is fully determined by the input.
pub fn collect_usage_details(payload: &Value) -> Vec<UsageDetail> {
    let usage = payload.get("usage").filter(|u| u.is_object()).unwrap_or(payload);

    let Some(apis) = usage.get("apis").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut details = Vec::new();
    for api_entry in apis.values() {
        let Some(models) = api_entry.get("models").and_then(Value::as_object) else {
            continue;
        };
        for (model_name, model_entry) in models {
            let Some(entries) = model_entry.get("details").and_then(Value::as_array) else {
                continue;
            };
            details.extend(entries.iter().filter_map(|raw| parse_detail(raw, model_name)));
        }
    }

    details.sort_by_key(|d| d.timestamp);
    details
}

fn parse_detail(raw: &Value, model: &str) -> Option<UsageDetail> {
    if !raw.is_object() {
        return None;
    }
    let timestamp = raw.get("timestamp").and_then(parse_timestamp)?;

    let source = raw
        .get("source")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let outcome = if raw.get("failed").and_then(Value::as_bool) == Some(true) {
        Outcome::Failure
    } else {
        Outcome::Success
    };

    Some(UsageDetail {
        source,
        auth_index: auth_index_field(raw),
        timestamp,
        outcome,
        model: model.to_string(),
    })
}
