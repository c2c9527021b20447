//! Quota window model - a provider-agnostic remaining-percent bar

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// When a quota window resets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum QuotaReset {
    None,
    /// Seconds until reset, relative to when the snapshot was taken
    CountdownSecs(u64),
    At(DateTime<Utc>),
    /// Upstream reset text that did not parse as a time
    Text(String),
}

impl QuotaReset {
    pub fn is_none(&self) -> bool {
        matches!(self, QuotaReset::None)
    }

    /// Format the reset as a countdown string ("2d 3h", "4h 10m", "5m", "now")
    pub fn format_countdown(&self, now: DateTime<Utc>) -> Option<String> {
        let seconds = match self {
            QuotaReset::None => return None,
            QuotaReset::Text(text) => return Some(text.clone()),
            QuotaReset::CountdownSecs(secs) => *secs as i64,
            QuotaReset::At(at) => {
                if *at <= now {
                    return Some("now".to_string());
                }
                (*at - now).num_seconds()
            }
        };

        if seconds <= 0 {
            return Some("now".to_string());
        }

        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;

        if hours > 24 {
            Some(format!("{}d {}h", hours / 24, hours % 24))
        } else if hours > 0 {
            Some(format!("{}h {}m", hours, minutes))
        } else {
            Some(format!("{}m", minutes.max(1)))
        }
    }
}

/// One renderable quota bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaWindow {
    /// Display label (e.g., "5-Hour", "Weekly", "Claude/GPT")
    pub label: String,

    /// Remaining percentage (0-100); `None` when the upstream gave no usable value
    pub remaining_percent: Option<f64>,

    pub reset: QuotaReset,
}

impl QuotaWindow {
    pub fn new(label: impl Into<String>, remaining_percent: Option<f64>) -> Self {
        Self {
            label: label.into(),
            remaining_percent: remaining_percent.map(clamp_percent),
            reset: QuotaReset::None,
        }
    }

    /// Builder pattern: set reset
    pub fn with_reset(mut self, reset: QuotaReset) -> Self {
        self.reset = reset;
        self
    }

    /// Check if the window is exhausted (0% remaining)
    pub fn is_exhausted(&self) -> bool {
        self.remaining_percent.is_some_and(|p| p <= 0.0)
    }

    /// Remaining percent for display; `--` instead of `0%` when unknown
    pub fn format_remaining(&self) -> String {
        match self.remaining_percent {
            Some(p) => format!("{:.0}%", p),
            None => "--".to_string(),
        }
    }
}

/// Clamp a percentage into 0-100
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_clamping() {
        let window = QuotaWindow::new("Weekly", Some(150.0));
        assert_eq!(window.remaining_percent, Some(100.0));

        let window = QuotaWindow::new("Weekly", Some(-10.0));
        assert!(window.is_exhausted());
    }

    #[test]
    fn test_unknown_is_not_zero() {
        let window = QuotaWindow::new("5-Hour", None);
        assert_eq!(window.format_remaining(), "--");
        assert!(!window.is_exhausted());
    }

    #[test]
    fn test_countdown_formats() {
        assert_eq!(QuotaReset::CountdownSecs(90).format_countdown(now()), Some("1m".into()));
        assert_eq!(QuotaReset::CountdownSecs(3 * 3600 + 600).format_countdown(now()), Some("3h 10m".into()));
        assert_eq!(QuotaReset::CountdownSecs(50 * 3600).format_countdown(now()), Some("2d 2h".into()));
        assert_eq!(QuotaReset::CountdownSecs(0).format_countdown(now()), Some("now".into()));
        assert_eq!(QuotaReset::None.format_countdown(now()), None);
    }

    #[test]
    fn test_absolute_reset() {
        let at = QuotaReset::At(now() + Duration::minutes(30));
        assert_eq!(at.format_countdown(now()), Some("30m".into()));
        let past = QuotaReset::At(now() - Duration::minutes(30));
        assert_eq!(past.format_countdown(now()), Some("now".into()));
    }
}
