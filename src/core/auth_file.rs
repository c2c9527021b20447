//! Auth file records as returned by the management API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::identity::normalize_auth_index;
use super::timestamp::parse_timestamp;

/// Backoff/exceeded state the proxy keeps per credential
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaStatus {
    #[serde(default)]
    pub exceeded: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_recover_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_level: Option<i64>,
}

impl QuotaStatus {
    pub fn next_recover_time(&self) -> Option<DateTime<Utc>> {
        self.next_recover_at
            .as_deref()
            .and_then(|s| parse_timestamp(&Value::String(s.to_string())))
    }
}

/// One stored credential record
///
/// Provider-specific quota blocks stay as raw JSON; the shape differs per
/// provider and per backend version, and `providers` parses them on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthFileItem {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(
        default,
        alias = "authIndex",
        deserialize_with = "deserialize_auth_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_index: Option<String>,

    #[serde(default)]
    pub disabled: bool,

    #[serde(default)]
    pub unavailable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// ChatGPT workspace, sent as `Chatgpt-Account-Id` when probing Codex
    #[serde(
        default,
        alias = "chatgpt_account_id",
        alias = "accountId",
        skip_serializing_if = "Option::is_none"
    )]
    pub account_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codex_quota: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antigravity_quota: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kiro_usage: Option<Value>,
}

fn deserialize_auth_index<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_auth_index(&value))
}

impl AuthFileItem {
    /// Identity used for in-place replacement: `id`, or `name` when the id is blank
    pub fn identity(&self) -> &str {
        if self.id.trim().is_empty() {
            &self.name
        } else {
            &self.id
        }
    }

    /// Whether two records describe the same credential
    pub fn same_identity(&self, other: &AuthFileItem) -> bool {
        (!self.id.is_empty() && self.id == other.id)
            || (!self.name.is_empty() && self.name == other.name)
    }

    /// Provider name, lowercased; `type` wins over `provider`
    pub fn provider_name(&self) -> String {
        self.kind
            .as_deref()
            .or(self.provider.as_deref())
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        !self.disabled && !self.unavailable
    }
}

/// Parse the auth-files listing; accepts `{files: [...]}` or a bare array
///
/// Entries that fail to deserialize are skipped rather than failing the list.
pub fn parse_auth_files(payload: &Value) -> Vec<AuthFileItem> {
    let list = payload
        .get("files")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array());

    let Some(list) = list else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|entry| match serde_json::from_value::<AuthFileItem>(entry.clone()) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!("Skipping malformed auth file entry: {}", e);
                None
            }
        })
        .collect()
}

/// Replace the record matching `updated` by identity, keeping list order
///
/// Returns `false` when no record matched (the list is left unchanged).
pub fn replace_by_identity(files: &mut [AuthFileItem], updated: AuthFileItem) -> bool {
    match files.iter_mut().find(|f| f.same_identity(&updated)) {
        Some(slot) => {
            *slot = updated;
            true
        }
        None => false,
    }
}

/// Active session count for one auth file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBinding {
    pub auth_id: String,

    #[serde(default)]
    pub session_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
}

/// Parse session bindings; accepts `{bindings: [...]}` or a bare array
pub fn parse_session_bindings(payload: &Value) -> Vec<SessionBinding> {
    let list = payload
        .get("bindings")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array());

    list.map(|entries| {
        entries
            .iter()
            .filter_map(|e| serde_json::from_value::<SessionBinding>(e.clone()).ok())
            .filter(|b| !b.auth_id.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Find the binding for a file, joined by `id`
pub fn binding_for<'a>(file: &AuthFileItem, bindings: &'a [SessionBinding]) -> Option<&'a SessionBinding> {
    if file.id.is_empty() {
        return None;
    }
    bindings.iter().find(|b| b.auth_id == file.id)
}
