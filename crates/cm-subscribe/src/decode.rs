//! Single-layer base64 envelope detection.
//! [Chinese] 单层 Base64 外壳检测与解码。
use crate::model::SubsError;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

#[allow(clippy::expect_used)] // literal pattern
static ENVELOPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]{50,}={0,2}$").expect("envelope regex"));

/// Content must be longer than this (after trimming) to count as an envelope.
const MIN_ENVELOPE_LEN: usize = 100;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// No envelope detected; text passed through.
    Plain(String),
    /// Envelope detected and removed.
    Unwrapped(String),
    /// Envelope detected but not decodable; original text kept.
    Fallback { text: String, error: SubsError },
}

impl Decoded {
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(t) | Self::Unwrapped(t) => t,
            Self::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Plain(t) | Self::Unwrapped(t) => t,
            Self::Fallback { text, .. } => text,
        }
    }
}

pub fn looks_like_envelope(content: &str) -> bool {
    let t = content.trim();
    t.len() > MIN_ENVELOPE_LEN && ENVELOPE.is_match(t)
}

/// Base64 to UTF-8, tolerant of missing padding. Also used for vmess payloads.
pub(crate) fn b64_to_utf8(s: &str, url_safe_fallback: bool) -> Result<String, SubsError> {
    let s = s.trim();
    let bytes = match STANDARD_LENIENT.decode(s) {
        Ok(b) => b,
        Err(e) if url_safe_fallback => URL_SAFE_LENIENT
            .decode(s)
            .map_err(|_| SubsError::Decode(e.to_string()))?,
        Err(e) => return Err(SubsError::Decode(e.to_string())),
    };
    String::from_utf8(bytes).map_err(|e| SubsError::Decode(e.to_string()))
}

/// Reverse at most one base64 layer.
pub fn decode_content(content: &str) -> Decoded {
    if !looks_like_envelope(content) {
        return Decoded::Plain(content.to_string());
    }
    match b64_to_utf8(content, false) {
        Ok(text) => {
            tracing::debug!(bytes = text.len(), "base64 envelope removed");
            Decoded::Unwrapped(text)
        }
        Err(error) => Decoded::Fallback {
            text: content.to_string(),
            error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    const DOC: &str = "proxies:\n  - {name: a, type: ss, server: h, port: 1, cipher: aes-128-gcm, password: pw}\n";

    #[test]
    fn short_text_passes_through() {
        assert_eq!(decode_content("abc"), Decoded::Plain("abc".into()));
        // long but contains ':' so not an envelope
        assert!(matches!(decode_content(DOC), Decoded::Plain(_)));
    }

    #[test]
    fn envelope_is_unwrapped() {
        let wrapped = STANDARD.encode(DOC);
        assert!(wrapped.len() > MIN_ENVELOPE_LEN);
        assert_eq!(decode_content(&format!("{wrapped}\n")), Decoded::Unwrapped(DOC.into()));
    }

    #[test]
    fn bad_utf8_falls_back_to_raw() {
        let wrapped = STANDARD.encode([0xffu8; 90]);
        match decode_content(&wrapped) {
            Decoded::Fallback { text, error } => {
                assert_eq!(text, wrapped);
                assert_eq!(error.kind(), "decode");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn exactly_100_chars_is_not_an_envelope() {
        let s = "A".repeat(100);
        assert!(!looks_like_envelope(&s));
        assert!(looks_like_envelope(&"A".repeat(104)));
    }
}
