//! Lenient timestamp parsing for backend payloads

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Epoch values above this are treated as milliseconds
const MILLIS_THRESHOLD: f64 = 1e12;

/// Parse a timestamp that may be an RFC 3339 string or an epoch number
/// (seconds or milliseconds). Numeric strings are accepted too.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        _ => None,
    }
}

pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    trimmed.parse::<f64>().ok().and_then(from_epoch)
}

fn from_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }
    let millis = if raw > MILLIS_THRESHOLD { raw } else { raw * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rfc3339() {
        let ts = parse_timestamp(&json!("2025-01-15T10:00:00Z")).unwrap();
        assert_eq!(ts.timestamp(), 1_736_935_200);

        let offset = parse_timestamp(&json!("2025-01-15T18:00:00+08:00")).unwrap();
        assert_eq!(offset, ts);
    }

    #[test]
    fn test_epoch_seconds_and_millis() {
        let secs = parse_timestamp(&json!(1_736_935_200)).unwrap();
        let millis = parse_timestamp(&json!(1_736_935_200_000u64)).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(parse_timestamp(&json!("1736935200")), Some(secs));
    }

    #[test]
    fn test_garbage() {
        assert!(parse_timestamp(&json!("yesterday")).is_none());
        assert!(parse_timestamp(&json!("")).is_none());
        assert!(parse_timestamp(&json!(null)).is_none());
        assert!(parse_timestamp(&json!(-5)).is_none());
    }
}
