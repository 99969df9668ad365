//! Text and filesystem helpers shared by the pipeline stages.
//!
//! - HTML stripping and whitespace collapsing for feed summaries
//! - Character-safe truncation for summaries, prompts and log fields
//! - The link fingerprint used as a stable entry id
//! - Directory creation for the output locations

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Reduce an HTML fragment to its visible text.
///
/// Entities are decoded by the HTML parser; tags, comments and the contents
/// of `<script>`/`<style>` never reach the output.
pub fn strip_html(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return collapse_whitespace(html);
    }
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());
    for node in fragment.root_element().descendants() {
        let Some(t) = node.value().as_text() else {
            continue;
        };
        let inside_code = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style"))
        });
        if !inside_code {
            text.push_str(t);
            text.push(' ');
        }
    }
    collapse_whitespace(&text)
}

/// Stable 12-hex-character id for an entry link.
///
/// Same link, same id, across runs and machines.
pub fn fingerprint(link: &str) -> String {
    let digest = format!("{:x}", md5::compute(link.as_bytes()));
    digest[..12].to_string()
}

/// Ensure a directory exists, creating parents as needed.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path).await?;
    debug!("Directory ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_truncate_for_log_multibyte() {
        let s = "뉴스".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with("뉴스뉴"));
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_strip_html() {
        let html = "<p>Apple <b>unveils</b>&nbsp;glasses</p>\n<script>var x = 1;</script><img src=\"a.png\">";
        assert_eq!(strip_html(html), "Apple unveils glasses");
    }

    #[test]
    fn test_strip_html_plain_text() {
        assert_eq!(strip_html("  just   text \n"), "just text");
    }

    #[test]
    fn test_fingerprint_is_truncated_md5() {
        // md5("https://example.com/") = 182ccedb33a9e03fbf1079b209da1a31
        assert_eq!(fingerprint("https://example.com/"), "182ccedb33a9");
        assert_eq!(fingerprint("x").len(), 12);
    }
}
