//! Helpers shared by the fetchers and exporters.
//!
//! - String truncation for logging
//! - JSON error detection for handling LLM response truncation
//! - Markdown code fence stripping for LLM responses
//! - HTML to plain text for feed descriptions
//! - File system validation for output paths

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*```\s*$").expect("valid fence regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` bytes (backing off to a char boundary) with
/// an ellipsis and byte count appended.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
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
/// resulting JSON will fail to parse with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````) if present.
pub fn strip_code_fences(s: &str) -> &str {
    match CODE_FENCE.captures(s).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => s.trim(),
    }
}

/// Flatten an HTML fragment to its text, collapsing whitespace.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Ensure the directory that will hold `file_path` exists and is writable.
///
/// Creates the parent directory if needed, then writes and removes a probe
/// file next to where the output will go.
#[instrument(level = "info", skip_all, fields(path = %file_path.display()))]
pub async fn ensure_writable_parent(file_path: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match file_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = dir.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!(dir = %dir.display(), "Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
