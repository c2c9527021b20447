//! API key masking
//!
//! The proxy reports usage for API-key clients under a redacted form of the
//! key. The same redaction is used as an alternate lookup key when matching
//! statistics, and whenever a key is printed.

/// Placeholder used between the visible head and tail of a key
pub const MASK: &str = "***";

/// Mask an API key for display and statistics lookup
///
/// # Arguments
/// * `key` - The raw API key; surrounding whitespace is ignored
///
/// # Returns
/// An empty string for an empty key, all `*` for keys of 4 characters or
/// fewer, `ab***yz` for keys up to 8 characters, `abcd***wxyz` otherwise
pub fn mask_api_key(key: &str) -> String {
    let trimmed = key.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    let len = chars.len();

    match len {
        0 => String::new(),
        1..=4 => "*".repeat(len),
        5..=8 => {
            let head: String = chars[..2].iter().collect();
            let tail: String = chars[len - 2..].iter().collect();
            format!("{}{}{}", head, MASK, tail)
        }
        _ => {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[len - 4..].iter().collect();
            format!("{}{}{}", head, MASK, tail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_long_key() {
        assert_eq!(mask_api_key("sk-abcdef123456"), "sk-a***3456");
        assert_eq!(mask_api_key("  sk-abcdef123456\n"), "sk-a***3456");
    }

    #[test]
    fn test_mask_short_keys() {
        assert_eq!(mask_api_key(""), "");
        assert_eq!(mask_api_key("abc"), "***");
        assert_eq!(mask_api_key("abcd"), "****");
        assert_eq!(mask_api_key("abcdef"), "ab***ef");
        assert_eq!(mask_api_key("abcdefgh"), "ab***gh");
    }

    #[test]
    fn test_mask_multibyte() {
        assert_eq!(mask_api_key("ключ-секрет-1"), "ключ***ет-1");
    }
}
