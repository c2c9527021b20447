//! Generic OAuth quota: the proxy's own exceeded/backoff state

use serde::{Deserialize, Serialize};

use crate::core::{parse_timestamp_str, QuotaReset, QuotaStatus, QuotaWindow};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericQuota {
    pub exceeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_recover_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_level: Option<i64>,
}

impl GenericQuota {
    pub fn from_status(status: &QuotaStatus) -> Self {
        Self {
            exceeded: status.exceeded,
            reason: status.reason.clone(),
            next_recover_at: status.next_recover_at.clone(),
            backoff_level: status.backoff_level,
        }
    }

    /// All-or-nothing availability bar
    pub fn window(&self) -> QuotaWindow {
        let remaining = if self.exceeded { 0.0 } else { 100.0 };
        let reset = self
            .next_recover_at
            .as_deref()
            .and_then(parse_timestamp_str)
            .map(QuotaReset::At)
            .unwrap_or(QuotaReset::None);
        QuotaWindow::new("Availability", Some(remaining)).with_reset(reset)
    }

    pub fn hints(&self) -> Vec<String> {
        let mut hints = Vec::new();
        if let Some(reason) = self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            hints.push(reason.to_string());
        }
        if let Some(level) = self.backoff_level.filter(|l| *l > 0) {
            hints.push(format!("Backoff level {}", level));
        }
        hints
    }
}
