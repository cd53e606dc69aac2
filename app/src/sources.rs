//! Subscription list loading.
//! [Chinese] 订阅列表加载：每行 `文件名 | URL`，忽略空行与 `#` 注释。
use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path};

#[allow(clippy::expect_used)] // literal pattern
static ENTRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([^|]+?)\s*\|\s*(.+?)\s*$").expect("static regex"));
#[allow(clippy::expect_used)]
static HTTP_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub filename: String,
    pub url: String,
}

/// A bare file name: one normal path component, no separators.
pub fn is_plain_filename(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut parts = Path::new(name).components();
    matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None))
}

/// Parse list text. Bad lines are warned about and skipped.
pub fn parse_sources(text: &str) -> Vec<SourceEntry> {
    let mut out = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(caps) = ENTRY.captures(line) else {
            tracing::warn!(line = i + 1, content = line, "malformed subscription entry, expected `FILENAME | URL`");
            continue;
        };
        let filename = caps[1].trim().to_string();
        let url = caps[2].trim().to_string();
        if filename.is_empty() || url.is_empty() {
            tracing::warn!(line = i + 1, "subscription entry has an empty filename or url");
            continue;
        }
        if !is_plain_filename(&filename) {
            tracing::warn!(line = i + 1, filename = %filename, "filename must not contain a path, skipping entry");
            continue;
        }
        if !HTTP_URL.is_match(&url) {
            tracing::warn!(line = i + 1, url = %url, "url does not start with http:// or https://");
        }
        out.push(SourceEntry { filename, url });
    }
    out
}

/// Read and parse the list file; zero entries is an error.
pub fn load_sources(path: &Path) -> Result<Vec<SourceEntry>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read subscription list {}", path.display()))?;
    let entries = parse_sources(&text);
    if entries.is_empty() {
        bail!("no valid subscription entries in {}", path.display());
    }
    tracing::info!(count = entries.len(), path = %path.display(), "subscription list loaded");
    Ok(entries)
}
