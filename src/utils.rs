//! Utility functions for string cleanup, logging, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Markdown-fence stripping for LLM responses
//! - Character-safe truncation for post text and log output
//! - JSON error detection for handling LLM response truncation
//! - File system validation for the image download directory

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Matches the markdown code fences LLMs like to wrap JSON in.
static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?").unwrap());

/// Strip markdown code fences and surrounding whitespace from an LLM response.
///
/// Models frequently return ` ```json [...] ``` ` despite being asked for a
/// raw JSON array. This removes the fences and any stray wrapping quotes
/// around the whole payload so the result can be handed to `serde_json`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(strip_code_fences("```json\n[\"a\"]\n```"), "[\"a\"]");
/// assert_eq!(strip_code_fences("[\"a\"]"), "[\"a\"]");
/// ```
pub fn strip_code_fences(s: &str) -> String {
    let stripped = FENCE_RE.replace_all(s, "");
    let trimmed = stripped.trim();
    // A quoted payload like "[\"...\"]" is the array serialized as one JSON
    // string; decode it so the escapes inside come out as plain quotes.
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.contains('[') {
        if let Ok(unquoted) = serde_json::from_str::<String>(trimmed) {
            return unquoted.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Truncate post text to `max` characters without splitting a code point.
///
/// Byte-index slicing would panic on multi-byte characters (the fallback
/// thread uses emoji), so this counts `char`s.
pub fn truncate_post(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes with an ellipsis and
/// byte count indicator appended. The cut is floored to a char boundary;
/// model responses are arbitrary UTF-8, so a raw byte slice could land
/// inside a multi-byte character and panic.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off (e.g., due to token limits), the
/// resulting JSON will fail to parse with an EOF error. This function
/// helps identify such cases for the single re-ask.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file. Run before any image is
/// downloaded so a bad `--image-dir` fails fast.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Image directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_fenced_json() {
        let raw = "```json\n[\"one\", \"two\", \"three\"]\n```";
        assert_eq!(strip_code_fences(raw), "[\"one\", \"two\", \"three\"]");
    }

    #[test]
    fn test_strip_code_fences_bare_fence() {
        let raw = "```\n[\"one\"]\n```";
        assert_eq!(strip_code_fences(raw), "[\"one\"]");
    }

    #[test]
    fn test_strip_code_fences_passthrough() {
        let raw = "[\"one\", \"two\"]";
        assert_eq!(strip_code_fences(raw), raw);
    }

    #[test]
    fn test_strip_code_fences_wrapping_quotes() {
        // The whole array delivered as one JSON string; unwrapping must also
        // decode the inner escapes so the result parses as an array.
        let raw = "\"[\\\"one\\\"]\"";
        let out = strip_code_fences(raw);
        assert_eq!(out, r#"["one"]"#);
        let parsed: Vec<String> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, vec!["one"]);
    }

    #[test]
    fn test_truncate_post_short() {
        assert_eq!(truncate_post("hello", 280), "hello");
    }

    #[test]
    fn test_truncate_post_exact_limit() {
        let s = "a".repeat(280);
        assert_eq!(truncate_post(&s, 280), s);
    }

    #[test]
    fn test_truncate_post_over_limit() {
        let s = "a".repeat(300);
        assert_eq!(truncate_post(&s, 280).chars().count(), 280);
    }

    #[test]
    fn test_truncate_post_multibyte_safe() {
        let s = "🏎️".repeat(200);
        let out = truncate_post(&s, 280);
        assert!(out.chars().count() <= 280);
        // Must not panic and must remain valid UTF-8 (guaranteed by chars()).
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte_boundary() {
        // 299 ASCII bytes followed by a 4-byte emoji: byte 300 falls inside
        // the emoji, so the cut must back up to the nearest char boundary.
        let s = format!("{}🏎{}", "a".repeat(299), "b".repeat(100));
        let result = truncate_for_log(&s, 300);
        assert!(result.starts_with(&"a".repeat(299)));
        assert!(!result.contains('🏎'));
        assert!(result.contains("…(+"));
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"["tweet one", "tweet tw"#; // cut off mid-array
        let result: Result<serde_json::Value, _> = serde_json::from_str(json_eof);
        if let Err(e) = result {
            assert!(looks_truncated(&e));
        }
    }

    #[test]
    fn test_looks_truncated_rejects_syntax_error() {
        // Trailing comma is a syntax error, not truncation.
        let bad = r#"["one", "two",]"#;
        let e = serde_json::from_str::<serde_json::Value>(bad).unwrap_err();
        assert!(!looks_truncated(&e));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = format!("{}/a/b", dir.path().display());
        ensure_writable_dir(&nested).await.unwrap();
        assert!(std::path::Path::new(&nested).is_dir());
    }
}
