//! Decide whether decoded text is a structured document or a share-link list.
use serde::Serialize;
use serde_yaml::Value as YamlValue;

/// Top-level keys that mark a mapping as a client configuration document.
const MARKER_KEYS: &[&str] = &[
    "proxies",
    "proxy-groups",
    "proxy-providers",
    "rules",
    "port",
    "socks-port",
    "mixed-port",
    "allow-lan",
    "mode",
    "log-level",
    "external-controller",
    "dns",
];

/// Lines starting with these are document syntax, never share-links.
const STRUCTURAL_TOKENS: &[&str] = &["{", "[", "mixed-port", "proxies:", "proxy-groups:", "rules:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Structured,
    ShareLinks,
    Ambiguous,
}

/// Non-empty, non-comment, contains `://`, not document syntax.
pub(crate) fn is_share_link_candidate(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty()
        && !t.starts_with('#')
        && t.contains("://")
        && !STRUCTURAL_TOKENS.iter().any(|tok| t.starts_with(tok))
}

fn is_structured(text: &str) -> bool {
    match serde_yaml::from_str::<YamlValue>(text) {
        Ok(YamlValue::Mapping(m)) => MARKER_KEYS.iter().any(|k| m.contains_key(*k)),
        _ => false,
    }
}

pub fn classify(text: &str) -> Format {
    if is_structured(text) {
        Format::Structured
    } else if text.lines().any(is_share_link_candidate) {
        Format::ShareLinks
    } else {
        Format::Ambiguous
    }
}
