//! OAuth model exclusion lists and their editable text form
//!
//! Operators edit exclusions as free text, one model per line or comma
//! separated. The API stores them as a list per provider.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::Value;

fn separator_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[\r\n,]+").expect("Invalid separator regex"))
}

/// Parse exclusion text into model names, trimmed, order and duplicates kept
pub fn parse_excluded_models(text: &str) -> Vec<String> {
    separator_regex()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a model list as exclusion text, one model per line
pub fn excluded_models_to_text(models: &[String]) -> String {
    models
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the exclusion map returned by the API
///
/// Accepts `{"oauth-excluded-models": {provider: [..]}}` or the bare map.
/// Providers are lowercased; non-string entries are dropped.
pub fn parse_exclusion_map(payload: &Value) -> BTreeMap<String, Vec<String>> {
    let map = payload
        .get("oauth-excluded-models")
        .and_then(Value::as_object)
        .or_else(|| payload.as_object());

    let Some(map) = map else {
        return BTreeMap::new();
    };

    map.iter()
        .filter_map(|(provider, models)| {
            let models = models.as_array()?;
            let provider = provider.trim().to_lowercase();
            if provider.is_empty() {
                return None;
            }
            let list = models
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            Some((provider, list))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_preserves_order_and_duplicates() {
        let models: Vec<String> = vec!["gemini-2.5-pro", "claude-sonnet-4-5", "gemini-2.5-pro", "gpt-4o"]
            .into_iter()
            .map(String::from)
            .collect();
        let text = excluded_models_to_text(&models);
        assert_eq!(parse_excluded_models(&text), models);
    }

    #[test]
    fn test_round_trip_trims_whitespace() {
        let models = vec!["  a ".to_string(), "b\t".to_string()];
        let text = excluded_models_to_text(&models);
        assert_eq!(parse_excluded_models(&text), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_mixed_separators() {
        let parsed = parse_excluded_models("a, b\n\nc\r\n , d,");
        assert_eq!(parsed, vec!["a", "b", "c", "d"]);
        assert!(parse_excluded_models("  \n , ").is_empty());
    }

    #[test]
    fn test_parse_exclusion_map() {
        let payload = json!({"oauth-excluded-models": {
            "Gemini-CLI": ["gemini-2.5-pro", " ", 3],
            "codex": "not-a-list"
        }});
        let map = parse_exclusion_map(&payload);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("gemini-cli"), Some(&vec!["gemini-2.5-pro".to_string()]));
    }
}
