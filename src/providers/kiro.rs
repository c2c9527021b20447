//! Kiro (AWS) usage normalization
//!
//! The backend stores Kiro's usage summary as `kiro_usage`: a used amount, a
//! limit, and the next reset.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::as_number;
use crate::core::{clamp_percent, parse_timestamp, QuotaReset, QuotaWindow};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KiroQuota {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    /// `None` until the backend has reported usage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<QuotaWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
}

impl KiroQuota {
    pub fn hints(&self) -> Vec<String> {
        let mut hints = Vec::new();
        if let Some(plan) = &self.plan {
            hints.push(plan.clone());
        }
        if let (Some(used), Some(limit)) = (self.used, self.limit) {
            hints.push(format!("{:.0} / {:.0}", used, limit));
        }
        hints
    }
}

/// Parse a `kiro_usage` block; `None` when neither usage nor limit is present
pub fn parse_kiro_usage(value: &Value) -> Option<KiroQuota> {
    if !value.is_object() {
        return None;
    }

    let used = ["current_usage", "currentUsage", "used", "usage"]
        .iter()
        .find_map(|key| value.get(key).and_then(as_number));

    let limit = ["usage_limit", "usageLimit", "limit", "quota"]
        .iter()
        .find_map(|key| value.get(key).and_then(as_number));

    if used.is_none() && limit.is_none() {
        return None;
    }

    let remaining = match (used, limit) {
        (Some(used), Some(limit)) if limit > 0.0 => Some(clamp_percent(100.0 - used / limit * 100.0)),
        (Some(_), Some(_)) => Some(0.0),
        _ => None,
    };

    let reset = ["next_reset", "nextDateReset", "reset_at"]
        .iter()
        .find_map(|key| value.get(key).and_then(parse_timestamp))
        .map(QuotaReset::At)
        .or_else(|| {
            value
                .get("days_until_reset")
                .and_then(as_number)
                .filter(|d| *d >= 0.0)
                .map(|d| QuotaReset::CountdownSecs((d * 86_400.0) as u64))
        })
        .unwrap_or(QuotaReset::None);

    let plan = ["subscription_title", "subscriptionTitle", "plan", "tier"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(KiroQuota {
        plan,
        window: Some(QuotaWindow::new("Monthly", remaining).with_reset(reset)),
        used,
        limit,
    })
}
