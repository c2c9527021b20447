//! Codex (OpenAI/ChatGPT) quota normalization
//!
//! The backend stores the ChatGPT `wham/usage` response on the auth file as
//! `codex_quota`. Windows report *used* percent and seconds until reset; the
//! display wants *remaining* percent and a countdown.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{as_number, QuotaError};
use crate::api::{ApiCallRequest, ManagementApi};
use crate::core::{clamp_percent, parse_timestamp, QuotaReset, QuotaWindow};

/// ChatGPT usage endpoint, probed through api-call when the backend has no
/// codex quota endpoint
pub const CODEX_USAGE_URL: &str = "https://chatgpt.com/backend-api/wham/usage";

/// Normalized Codex quota
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodexQuota {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,

    /// Display plan (e.g., "ChatGPT Plus")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<QuotaWindow>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<QuotaWindow>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<CodexCredits>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodexCredits {
    pub has_credits: bool,
    pub unlimited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
}

impl CodexCredits {
    /// Balance hint for display; nothing for unlimited or empty credit
    pub fn hint(&self) -> Option<String> {
        if self.unlimited {
            return Some("Credits: unlimited".to_string());
        }
        if !self.has_credits {
            return None;
        }
        self.balance.map(|b| format!("Credits: {:.2}", b))
    }
}

impl CodexQuota {
    pub fn windows(&self) -> Vec<QuotaWindow> {
        self.primary.iter().chain(self.secondary.iter()).cloned().collect()
    }

    pub fn hints(&self) -> Vec<String> {
        let mut hints = Vec::new();
        if let Some(plan) = &self.plan_label {
            hints.push(plan.clone());
        }
        if let Some(hint) = self.credits.as_ref().and_then(CodexCredits::hint) {
            hints.push(hint);
        }
        hints
    }
}

/// Remaining percent from used percent, clamped to 0-100
///
/// `None` stays `None` so an unknown value renders as `--`, not `0%`.
pub fn remaining_from_used_percent(used: Option<f64>) -> Option<f64> {
    used.filter(|u| u.is_finite()).map(|u| clamp_percent(100.0 - u))
}

/// Parse a stored `codex_quota` block or a raw usage response
///
/// Returns `None` when nothing usable is present.
pub fn parse_codex_quota(value: &Value) -> Option<CodexQuota> {
    if !value.is_object() {
        return None;
    }

    let (primary_raw, secondary_raw) = locate_windows(value);
    let primary = primary_raw.and_then(|w| parse_window(w, "Primary"));
    let secondary = secondary_raw.and_then(|w| parse_window(w, "Secondary"));

    let plan_type = value
        .get("plan_type")
        .or_else(|| value.get("planType"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let plan_label = plan_type.as_deref().map(plan_label);

    let credits = value.get("credits").and_then(parse_credits);

    if primary.is_none() && secondary.is_none() && plan_type.is_none() && credits.is_none() {
        return None;
    }

    Some(CodexQuota {
        plan_type,
        plan_label,
        primary,
        secondary,
        credits,
    })
}

/// Find the two windows under any of the shapes the backend has used
fn locate_windows(value: &Value) -> (Option<&Value>, Option<&Value>) {
    let rate_limit = value.get("rate_limit").or_else(|| value.get("rateLimit"));
    if let Some(rate_limit) = rate_limit.filter(|r| r.is_object()) {
        return (
            rate_limit.get("primary_window"),
            rate_limit.get("secondary_window"),
        );
    }

    if value.get("primary_window").is_some() || value.get("secondary_window").is_some() {
        return (value.get("primary_window"), value.get("secondary_window"));
    }

    (value.get("primary"), value.get("secondary"))
}

fn parse_window(window: &Value, fallback_label: &str) -> Option<QuotaWindow> {
    if !window.is_object() {
        return None;
    }

    let used = window
        .get("used_percent")
        .or_else(|| window.get("usedPercent"))
        .and_then(as_number);

    let limit_seconds = window
        .get("limit_window_seconds")
        .or_else(|| window.get("limitWindowSeconds"))
        .and_then(as_number);

    let reset = match window
        .get("reset_after_seconds")
        .or_else(|| window.get("resetAfterSeconds"))
        .and_then(as_number)
    {
        Some(secs) if secs >= 0.0 => QuotaReset::CountdownSecs(secs as u64),
        _ => window
            .get("reset_at")
            .and_then(parse_timestamp)
            .map(QuotaReset::At)
            .unwrap_or(QuotaReset::None),
    };

    if used.is_none() && reset.is_none() {
        return None;
    }

    let label = limit_seconds
        .and_then(window_label)
        .unwrap_or_else(|| fallback_label.to_string());

    Some(QuotaWindow::new(label, remaining_from_used_percent(used)).with_reset(reset))
}

/// Label a window by its length ("5-Hour", "Weekly", ...)
fn window_label(seconds: f64) -> Option<String> {
    if seconds <= 0.0 {
        return None;
    }
    let hours = (seconds / 3600.0).round() as i64;
    match hours {
        0 => Some(format!("{}-Minute", (seconds / 60.0).round() as i64)),
        168 => Some("Weekly".to_string()),
        24 => Some("Daily".to_string()),
        h if h % 24 == 0 => Some(format!("{}-Day", h / 24)),
        h => Some(format!("{}-Hour", h)),
    }
}

fn parse_credits(credits: &Value) -> Option<CodexCredits> {
    if !credits.is_object() {
        return None;
    }
    let has_credits = credits.get("has_credits").and_then(Value::as_bool).unwrap_or(false);
    let unlimited = credits.get("unlimited").and_then(Value::as_bool).unwrap_or(false);
    let balance = credits.get("balance").and_then(as_number);
    Some(CodexCredits {
        has_credits,
        unlimited,
        balance,
    })
}

fn plan_label(plan_type: &str) -> String {
    match plan_type.to_lowercase().as_str() {
        "guest" => "Guest".to_string(),
        "free" => "ChatGPT Free".to_string(),
        "go" => "ChatGPT Go".to_string(),
        "plus" => "ChatGPT Plus".to_string(),
        "pro" => "ChatGPT Pro".to_string(),
        "team" => "ChatGPT Team".to_string(),
        "business" => "ChatGPT Business".to_string(),
        "enterprise" => "ChatGPT Enterprise".to_string(),
        "education" | "edu" => "ChatGPT Education".to_string(),
        other => format!("ChatGPT {}", capitalize(other)),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Build the api-call request for the ChatGPT usage endpoint
pub fn codex_usage_request(auth_index: &str, account_id: Option<&str>) -> ApiCallRequest {
    let mut request = ApiCallRequest::new(auth_index, "GET", CODEX_USAGE_URL)
        .with_bearer_template()
        .with_header("Accept", "application/json")
        .with_header("User-Agent", "codex_cli_rs");

    if let Some(account_id) = account_id.map(str::trim).filter(|s| !s.is_empty()) {
        request = request.with_header("Chatgpt-Account-Id", account_id);
    }
    request
}

/// Fetch Codex quota directly from upstream through api-call
pub async fn probe_codex<A>(
    api: &A,
    auth_index: &str,
    account_id: Option<&str>,
) -> Result<CodexQuota, QuotaError>
where
    A: ManagementApi + ?Sized,
{
    let request = codex_usage_request(auth_index, account_id);
    let response = api.api_call(&request).await?;

    if !response.is_success() {
        return Err(QuotaError::Upstream(format!(
            "Codex usage endpoint returned {}",
            response.status_code
        )));
    }

    match response.json_body().as_ref().and_then(parse_codex_quota) {
        Some(quota) => Ok(quota),
        None => {
            tracing::debug!("Codex usage response carried no quota windows");
            Ok(CodexQuota::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remaining_from_used_percent() {
        assert_eq!(remaining_from_used_percent(Some(27.0)), Some(73.0));
        assert_eq!(remaining_from_used_percent(Some(130.0)), Some(0.0));
        assert_eq!(remaining_from_used_percent(Some(-5.0)), Some(100.0));
        assert_eq!(remaining_from_used_percent(None), None);
        assert_eq!(remaining_from_used_percent(Some(f64::NAN)), None);
    }

    #[test]
    fn test_parse_wham_usage_shape() {
        let payload = json!({
            "plan_type": "plus",
            "rate_limit": {
                "allowed": true,
                "primary_window": {"used_percent": 27, "limit_window_seconds": 18000, "reset_after_seconds": 3600},
                "secondary_window": {"used_percent": "40", "limit_window_seconds": 604800, "reset_after_seconds": 86400}
            },
            "credits": {"has_credits": true, "unlimited": false, "balance": "12.5"}
        });
        let quota = parse_codex_quota(&payload).unwrap();

        let primary = quota.primary.as_ref().unwrap();
        assert_eq!(primary.label, "5-Hour");
        assert_eq!(primary.remaining_percent, Some(73.0));
        assert_eq!(primary.reset, QuotaReset::CountdownSecs(3600));

        let secondary = quota.secondary.as_ref().unwrap();
        assert_eq!(secondary.label, "Weekly");
        assert_eq!(secondary.remaining_percent, Some(60.0));

        assert_eq!(quota.plan_label.as_deref(), Some("ChatGPT Plus"));
        assert_eq!(quota.hints(), vec!["ChatGPT Plus".to_string(), "Credits: 12.50".to_string()]);
        assert_eq!(quota.windows().len(), 2);
    }

    #[test]
    fn test_parse_flat_shape() {
        let payload = json!({
            "primary": {"used_percent": 10, "reset_at": 1736935200},
            "secondary": {"reset_after_seconds": 120}
        });
        let quota = parse_codex_quota(&payload).unwrap();
        let primary = quota.primary.unwrap();
        assert_eq!(primary.label, "Primary");
        assert_eq!(primary.remaining_percent, Some(90.0));
        assert!(matches!(primary.reset, QuotaReset::At(_)));

        let secondary = quota.secondary.unwrap();
        assert_eq!(secondary.remaining_percent, None);
        assert_eq!(secondary.format_remaining(), "--");
    }

    #[test]
    fn test_malformed_is_no_data() {
        assert!(parse_codex_quota(&json!(null)).is_none());
        assert!(parse_codex_quota(&json!("text")).is_none());
        assert!(parse_codex_quota(&json!({})).is_none());
        assert!(parse_codex_quota(&json!({"rate_limit": {"primary_window": 5}})).is_none());
    }

    #[test]
    fn test_plan_labels() {
        assert_eq!(plan_label("pro"), "ChatGPT Pro");
        assert_eq!(plan_label("edu"), "ChatGPT Education");
        assert_eq!(plan_label("starter"), "ChatGPT Starter");
    }

    #[test]
    fn test_unlimited_credits_hint() {
        let credits = CodexCredits { has_credits: true, unlimited: true, balance: Some(3.0) };
        assert_eq!(credits.hint().as_deref(), Some("Credits: unlimited"));
        let empty = CodexCredits { has_credits: false, unlimited: false, balance: Some(0.0) };
        assert_eq!(empty.hint(), None);
    }

    #[test]
    fn test_usage_probe_status_and_empty_body() {
        use crate::refresh::mock::{MockApi, Reply};
        use std::time::Duration;

        let api = MockApi::new();
        api.script_upstream(CODEX_USAGE_URL, Duration::ZERO, Reply::Status(401));
        let result = tokio_test::block_on(probe_codex(&api, "1", None));
        assert!(matches!(result, Err(QuotaError::Upstream(m)) if m.contains("401")));

        let api = MockApi::new();
        api.script_upstream(CODEX_USAGE_URL, Duration::ZERO, Reply::Json(json!({"unrelated": true})));
        let quota = tokio_test::block_on(probe_codex(&api, "1", None)).unwrap();
        assert!(quota.windows().is_empty());
    }

    #[test]
    fn test_usage_request_headers() {
        let request = codex_usage_request("4", Some(" acct-1 "));
        assert_eq!(request.url, CODEX_USAGE_URL);
        assert_eq!(request.header.get("Chatgpt-Account-Id").map(String::as_str), Some("acct-1"));
        assert_eq!(request.header.get("Authorization").map(String::as_str), Some("Bearer $TOKEN$"));
    }
}
