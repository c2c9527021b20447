//! Terminal rendering helpers

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{KeyStatBucket, QuotaWindow, StatusBarData};

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn format_bucket(bucket: &KeyStatBucket) -> String {
    format!("{} ok / {} failed", bucket.success, bucket.failure)
}

/// `[..........++x~] 75.0%`
pub(crate) fn format_status_bar(bar: &StatusBarData) -> String {
    format!("[{}] {}", bar.render(), bar.format_rate())
}

/// Text meter for a remaining percent
pub(crate) fn meter(remaining: Option<f64>, width: usize) -> String {
    match remaining {
        Some(percent) => {
            let filled = ((percent / 100.0) * width as f64).round() as usize;
            let filled = filled.min(width);
            format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
        }
        None => "?".repeat(width),
    }
}

pub(crate) fn format_window(window: &QuotaWindow, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "{:<18} {} {:>5}",
        truncate(&window.label, 18),
        meter(window.remaining_percent, 20),
        window.format_remaining()
    );
    if window.is_exhausted() {
        line.push_str("  exhausted");
    }
    if let Some(countdown) = window.reset.format_countdown(now) {
        line.push_str(&format!("  resets in {}", countdown));
    }
    line
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::QuotaReset;

    #[test]
    fn test_meter() {
        assert_eq!(meter(Some(50.0), 10), "#####-----");
        assert_eq!(meter(Some(100.0), 4), "####");
        assert_eq!(meter(None, 3), "???");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("claude-sonnet-4-5-thinking", 8), "claude-~");
    }

    #[test]
    fn test_format_window_with_countdown() {
        let window = QuotaWindow::new("5-Hour", Some(73.0)).with_reset(QuotaReset::CountdownSecs(3600));
        let line = format_window(&window, Utc::now());
        assert!(line.starts_with("5-Hour"));
        assert!(line.contains("73%"));
        assert!(line.contains("resets in 1h 0m"));
        assert!(!line.contains("exhausted"));

        let spent = QuotaWindow::new("Weekly", Some(0.0));
        assert!(format_window(&spent, Utc::now()).ends_with("exhausted"));
    }
}
