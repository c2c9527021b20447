//! Identity normalization
//!
//! Auth files and usage details carry the same credential identity under
//! different spellings: `auth_index` vs `authIndex`, numbers vs strings,
//! file names with or without the `.json` extension. Everything here maps
//! those onto one comparable key.

use serde_json::Value;

/// Canonicalize an auth-index-like value into a lookup key
///
/// A finite number is stringified, a string is trimmed and kept if non-empty.
/// Anything else (null, NaN, bool, objects, blank strings) yields `None`.
pub fn normalize_auth_index(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().and_then(format_finite)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

fn format_finite(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Some(format!("{}", value as i64))
    } else {
        Some(value.to_string())
    }
}

/// Read an auth index from a JSON object under either spelling
pub fn auth_index_field(object: &Value) -> Option<String> {
    object
        .get("auth_index")
        .and_then(normalize_auth_index)
        .or_else(|| object.get("authIndex").and_then(normalize_auth_index))
}

/// Strip the last extension from a file name (`codex-a.json` -> `codex-a`)
///
/// Dotfiles keep their name (`.env` stays `.env`).
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_are_stringified() {
        assert_eq!(normalize_auth_index(&json!(3)), Some("3".to_string()));
        assert_eq!(normalize_auth_index(&json!(0)), Some("0".to_string()));
        assert_eq!(normalize_auth_index(&json!(-7)), Some("-7".to_string()));
        assert_eq!(normalize_auth_index(&json!(3.0)), Some("3".to_string()));
        assert_eq!(normalize_auth_index(&json!(2.5)), Some("2.5".to_string()));
    }

    #[test]
    fn test_strings_are_trimmed() {
        assert_eq!(normalize_auth_index(&json!("  12 ")), Some("12".to_string()));
        assert_eq!(normalize_auth_index(&json!("abc")), Some("abc".to_string()));
    }

    #[test]
    fn test_absent_values() {
        assert_eq!(normalize_auth_index(&Value::Null), None);
        assert_eq!(normalize_auth_index(&json!("")), None);
        assert_eq!(normalize_auth_index(&json!("   \t")), None);
        assert_eq!(normalize_auth_index(&json!(true)), None);
        assert_eq!(normalize_auth_index(&json!({"a": 1})), None);
        assert_eq!(format_finite(f64::NAN), None);
        assert_eq!(format_finite(f64::INFINITY), None);
    }

    #[test]
    fn test_numeric_and_string_forms_compare_equal() {
        let from_file = normalize_auth_index(&json!(42));
        let from_usage = normalize_auth_index(&json!(" 42"));
        assert_eq!(from_file, from_usage);
    }

    #[test]
    fn test_auth_index_field_spellings() {
        assert_eq!(auth_index_field(&json!({"auth_index": 5})), Some("5".into()));
        assert_eq!(auth_index_field(&json!({"authIndex": "5"})), Some("5".into()));
        assert_eq!(auth_index_field(&json!({"auth_index": "", "authIndex": 9})), Some("9".into()));
        assert_eq!(auth_index_field(&json!({})), None);
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("file.json"), "file");
        assert_eq!(strip_extension("a.b.json"), "a.b");
        assert_eq!(strip_extension("noext"), "noext");
        assert_eq!(strip_extension(".env"), ".env");
    }
}
