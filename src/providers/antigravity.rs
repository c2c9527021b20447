//! Antigravity quota normalization
//!
//! Two payload shapes exist. The backend may store a pre-computed list on the
//! auth file (`antigravity_quota.models[]`), or the console probes Google's
//! `fetchAvailableModels` through api-call and consolidates the discovered
//! models into a fixed catalog of groups.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{as_number, QuotaError};
use crate::api::{ApiCallRequest, ManagementApi};
use crate::core::{parse_timestamp, QuotaReset, QuotaWindow};

/// Mirrored upstream endpoints, tried in order
pub const ANTIGRAVITY_QUOTA_URLS: [&str; 3] = [
    "https://daily-cloudcode-pa.googleapis.com/v1internal:fetchAvailableModels",
    "https://daily-cloudcode-pa.sandbox.googleapis.com/v1internal:fetchAvailableModels",
    "https://cloudcode-pa.googleapis.com/v1internal:fetchAvailableModels",
];

const USER_AGENT: &str = "antigravity/1.11.5 windows/amd64";

/// A named cluster of models sharing one quota allowance
struct GroupDefinition {
    id: &'static str,
    label: &'static str,
    identifiers: &'static [&'static str],
    /// Use the matched model's display name as the label
    label_from_model: bool,
    /// Group whose reset time applies when this one has none
    reset_fallback: Option<&'static str>,
}

const ANTIGRAVITY_GROUPS: [GroupDefinition; 4] = [
    GroupDefinition {
        id: "claude-gpt",
        label: "Claude/GPT",
        identifiers: &[
            "claude-sonnet-4-5-thinking",
            "claude-opus-4-5-thinking",
            "claude-sonnet-4-5",
            "gpt-oss-120b-medium",
        ],
        label_from_model: false,
        reset_fallback: None,
    },
    GroupDefinition {
        id: "gemini",
        label: "Gemini",
        identifiers: &[
            "gemini-3-pro-high",
            "gemini-3-pro-low",
            "gemini-2.5-pro",
            "gemini-2.5-flash",
            "gemini-2.5-flash-thinking",
            "gemini-2.5-flash-lite",
        ],
        label_from_model: false,
        reset_fallback: None,
    },
    GroupDefinition {
        id: "gemini-3-flash",
        label: "Gemini 3 Flash",
        identifiers: &["gemini-3-flash"],
        label_from_model: false,
        reset_fallback: None,
    },
    GroupDefinition {
        id: "gemini-image",
        label: "Gemini Image",
        identifiers: &["gemini-3-pro-image"],
        label_from_model: true,
        // shares the main Gemini quota window
        reset_fallback: Some("gemini"),
    },
];

/// Consolidated quota for one catalog group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntigravityQuotaGroup {
    pub id: String,
    pub label: String,
    /// Model identifiers that contributed
    pub models: Vec<String>,
    /// Smallest remaining fraction (0-1) across the models
    pub remaining_fraction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
}

impl AntigravityQuotaGroup {
    pub fn to_window(&self) -> QuotaWindow {
        QuotaWindow::new(self.label.clone(), Some(self.remaining_fraction * 100.0))
            .with_reset(reset_from_text(self.reset_time.as_deref()))
    }
}

struct ModelQuota<'a> {
    id: &'a str,
    display_name: Option<&'a str>,
    remaining_fraction: f64,
    reset_time: Option<String>,
}

/// Extract the model map from a `fetchAvailableModels` body
///
/// The body may be a JSON string or an object. An empty or malformed map is
/// `None`.
pub fn parse_models_payload(body: &Value) -> Option<Map<String, Value>> {
    let parsed;
    let body = match body {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text.trim()).ok()?;
            &parsed
        }
        other => other,
    };

    let models = body.get("models")?.as_object()?;
    if models.is_empty() {
        return None;
    }
    Some(models.clone())
}

/// Consolidate discovered models into catalog groups
///
/// A group with no matching model carrying a parseable remaining fraction is
/// omitted, never zero-filled.
pub fn build_quota_groups(models: &Map<String, Value>) -> Vec<AntigravityQuotaGroup> {
    let mut groups: Vec<AntigravityQuotaGroup> = Vec::new();

    for definition in &ANTIGRAVITY_GROUPS {
        // one entry can match by id and again by display name
        let mut seen = HashSet::new();
        let matched: Vec<ModelQuota> = definition
            .identifiers
            .iter()
            .filter_map(|identifier| find_model(models, identifier))
            .filter(|(id, _)| seen.insert(*id))
            .filter_map(|(id, entry)| model_quota(id, entry))
            .collect();

        if matched.is_empty() {
            continue;
        }

        let remaining_fraction = matched
            .iter()
            .map(|m| m.remaining_fraction)
            .fold(f64::INFINITY, f64::min);

        let reset_time = matched
            .iter()
            .find_map(|m| m.reset_time.clone())
            .or_else(|| {
                definition.reset_fallback.and_then(|fallback| {
                    groups
                        .iter()
                        .find(|g| g.id == fallback)
                        .and_then(|g| g.reset_time.clone())
                })
            });

        let label = if definition.label_from_model {
            matched
                .iter()
                .find_map(|m| m.display_name)
                .map(str::to_string)
                .unwrap_or_else(|| definition.label.to_string())
        } else {
            definition.label.to_string()
        };

        groups.push(AntigravityQuotaGroup {
            id: definition.id.to_string(),
            label,
            models: matched.iter().map(|m| m.id.to_string()).collect(),
            remaining_fraction,
            reset_time,
        });
    }

    groups
}

/// Look up a model by exact id, then by case-insensitive display name
fn find_model<'a>(models: &'a Map<String, Value>, identifier: &str) -> Option<(&'a str, &'a Value)> {
    if let Some((id, entry)) = models.get_key_value(identifier) {
        return Some((id.as_str(), entry));
    }
    models.iter().find_map(|(id, entry)| {
        display_name(entry)
            .filter(|name| name.eq_ignore_ascii_case(identifier))
            .map(|_| (id.as_str(), entry))
    })
}

fn display_name(entry: &Value) -> Option<&str> {
    entry
        .get("displayName")
        .or_else(|| entry.get("display_name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn model_quota<'a>(id: &'a str, entry: &'a Value) -> Option<ModelQuota<'a>> {
    let info = entry
        .get("quotaInfo")
        .or_else(|| entry.get("quota_info"))
        .unwrap_or(entry);

    let remaining_fraction = info
        .get("remainingFraction")
        .or_else(|| info.get("remaining_fraction"))
        .or_else(|| info.get("remaining"))
        .and_then(parse_fraction)?;

    let reset_time = info
        .get("resetTime")
        .or_else(|| info.get("reset_time"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(ModelQuota {
        id,
        display_name: display_name(entry),
        remaining_fraction,
        reset_time,
    })
}

/// Parse a fraction given as `0.8`, `"0.8"` or `"80%"`, clamped to 0-1
fn parse_fraction(value: &Value) -> Option<f64> {
    let fraction = match value {
        Value::String(s) if s.trim().ends_with('%') => {
            s.trim().trim_end_matches('%').trim().parse::<f64>().ok()? / 100.0
        }
        other => as_number(other)?,
    };
    if !fraction.is_finite() {
        return None;
    }
    Some(fraction.clamp(0.0, 1.0))
}

fn reset_from_text(text: Option<&str>) -> QuotaReset {
    match text {
        None => QuotaReset::None,
        Some(t) => parse_timestamp(&Value::String(t.to_string()))
            .map(QuotaReset::At)
            .unwrap_or_else(|| QuotaReset::Text(t.to_string())),
    }
}

/// Parse the pre-computed `antigravity_quota` block into independent bars
pub fn parse_precomputed_models(value: &Value) -> Option<Vec<QuotaWindow>> {
    let models = value
        .get("models")
        .and_then(Value::as_array)
        .or_else(|| value.as_array())?;

    let windows: Vec<QuotaWindow> = models
        .iter()
        .filter_map(|entry| {
            let name = entry
                .get("name")
                .or_else(|| entry.get("display_name"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())?;
            let remaining = entry
                .get("remaining_percent")
                .or_else(|| entry.get("percentage"))
                .and_then(as_number);
            let reset = entry
                .get("reset_time")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty());
            Some(QuotaWindow::new(name, remaining).with_reset(reset_from_text(reset)))
        })
        .collect();

    if windows.is_empty() {
        None
    } else {
        Some(windows)
    }
}

/// Build the api-call request for one mirrored endpoint
pub fn antigravity_request(auth_index: &str, url: &str, project_id: Option<&str>) -> ApiCallRequest {
    let body = match project_id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(project) => serde_json::json!({ "project": project }).to_string(),
        None => "{}".to_string(),
    };
    ApiCallRequest::new(auth_index, "POST", url)
        .with_bearer_template()
        .with_header("Content-Type", "application/json")
        .with_header("User-Agent", USER_AGENT)
        .with_data(body)
}

/// Probe the mirrored endpoints in order and consolidate the first usable map
///
/// A non-2xx answer, a transport error, or an empty/malformed model map is a
/// soft failure and moves on to the next URL. Only when every URL fails is
/// an error returned. A usable map that matches no catalog group is a
/// success with zero groups.
pub async fn probe_antigravity<A>(
    api: &A,
    auth_index: &str,
    project_id: Option<&str>,
) -> Result<Vec<AntigravityQuotaGroup>, QuotaError>
where
    A: ManagementApi + ?Sized,
{
    let mut last_error = String::from("no endpoints configured");

    for url in ANTIGRAVITY_QUOTA_URLS {
        let request = antigravity_request(auth_index, url, project_id);
        match api.api_call(&request).await {
            Ok(response) if response.is_success() => {
                match response.json_body().as_ref().and_then(parse_models_payload) {
                    Some(models) => return Ok(build_quota_groups(&models)),
                    None => {
                        tracing::debug!("Antigravity endpoint {} returned no models", url);
                        last_error = format!("{}: empty model list", url);
                    }
                }
            }
            Ok(response) => {
                tracing::debug!("Antigravity endpoint {} returned {}", url, response.status_code);
                last_error = format!("{}: upstream returned {}", url, response.status_code);
            }
            Err(e) => {
                tracing::debug!("Antigravity endpoint {} failed: {}", url, e);
                last_error = format!("{}: {}", url, e);
            }
        }
    }

    Err(QuotaError::AllCandidatesFailed(last_error))
}
