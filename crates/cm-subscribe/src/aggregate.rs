//! Per-source parsing and ordered aggregation.
//! [Chinese] 单订阅源解析与按配置顺序的聚合。
//!
//! Pipeline per source: decode -> classify -> {share-link | document} -> records.
//! Sources are independent, so callers may run [`parse_source`] on any number
//! of workers; [`Aggregator::push`] must still be fed in configured order.
use crate::classify::{classify, Format};
use crate::decode::{decode_content, Decoded};
use crate::model::{ProxyRecord, SubsError};
use crate::parse_clash;
use crate::share_link::ShareLinkParser;
use serde::Serialize;

/// What the Downloader hands over for one configured `(filename, url)` pair.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub name: String,
    pub content: String,
    pub success: bool,
}

impl FetchedSource {
    pub fn ok(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            success: true,
        }
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: String::new(),
            success: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeState {
    None,
    Decoded,
    Failed,
}

/// One dropped line or entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    /// 1-based line number (share-links) or list position (documents).
    pub position: usize,
    pub kind: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub fetched: bool,
    pub envelope: EnvelopeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    pub accepted: usize,
    pub skipped: Vec<Skipped>,
    /// Set when the whole source contributed nothing for a single reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    fn new(name: &str, fetched: bool) -> Self {
        Self {
            name: name.to_string(),
            fetched,
            envelope: EnvelopeState::None,
            format: None,
            accepted: 0,
            skipped: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub records: Vec<ProxyRecord>,
    pub report: SourceReport,
}

impl SourceOutcome {
    fn accept(&mut self, position: usize, preview: Option<String>, result: Result<ProxyRecord, SubsError>) {
        match result {
            Ok(r) => self.records.push(r),
            Err(e) => {
                tracing::warn!(
                    source = %self.report.name,
                    position,
                    preview = preview.as_deref().unwrap_or(""),
                    reason = %e,
                    "skipping record"
                );
                self.report.skipped.push(Skipped {
                    position,
                    kind: e.kind(),
                    reason: e.to_string(),
                    preview,
                });
            }
        }
    }

    fn fail_whole(mut self, e: &SubsError) -> Self {
        tracing::warn!(source = %self.report.name, reason = %e, "source contributes no proxies");
        self.report.error = Some(e.to_string());
        self
    }
}

/// Parse one source's payload. Pure apart from logging.
pub fn parse_source(source: &FetchedSource) -> SourceOutcome {
    let mut out = SourceOutcome {
        records: Vec::new(),
        report: SourceReport::new(&source.name, source.success),
    };
    if !source.success {
        return out.fail_whole(&SubsError::Fetch("fetch failed".into()));
    }

    let decoded = decode_content(&source.content);
    out.report.envelope = match &decoded {
        Decoded::Plain(_) => EnvelopeState::None,
        Decoded::Unwrapped(_) => EnvelopeState::Decoded,
        Decoded::Fallback { error, .. } => {
            tracing::warn!(source = %source.name, reason = %error, "base64 envelope not decodable, using raw text");
            EnvelopeState::Failed
        }
    };
    let text = decoded.into_text();

    let format = classify(&text);
    out.report.format = Some(format);
    match format {
        Format::Structured => match parse_clash::extract(&text) {
            Ok(entries) => {
                for e in entries {
                    out.accept(e.index + 1, None, e.result);
                }
            }
            Err(e) => return out.fail_whole(&e),
        },
        Format::ShareLinks => {
            let mut parser = ShareLinkParser::new();
            for l in parser.parse_all(&text) {
                out.accept(l.line_no, Some(l.preview), l.result);
            }
        }
        Format::Ambiguous => return out.fail_whole(&SubsError::ClassifyAmbiguous),
    }

    out.report.accepted = out.records.len();
    tracing::info!(
        source = %source.name,
        format = ?format,
        accepted = out.report.accepted,
        skipped = out.report.skipped.len(),
        "source parsed"
    );
    out
}

/// End-of-run summary across every source, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub sources: Vec<SourceReport>,
    pub accepted: usize,
    pub skipped: usize,
}

/// Merged record list plus its report.
#[derive(Debug)]
pub struct Aggregate {
    pub records: Vec<ProxyRecord>,
    pub report: MergeReport,
}

/// Concatenates source outcomes in push order. No name deduplication.
#[derive(Debug, Default)]
pub struct Aggregator {
    records: Vec<ProxyRecord>,
    report: MergeReport,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: SourceOutcome) {
        self.report.accepted += outcome.records.len();
        self.report.skipped += outcome.report.skipped.len();
        self.report.sources.push(outcome.report);
        self.records.extend(outcome.records);
    }

    pub fn report(&self) -> &MergeReport {
        &self.report
    }

    /// Fails with [`SubsError::EmptyAggregate`] when nothing was accepted.
    pub fn finish(self) -> Result<Aggregate, SubsError> {
        if self.records.is_empty() {
            return Err(SubsError::EmptyAggregate);
        }
        Ok(Aggregate {
            records: self.records,
            report: self.report,
        })
    }
}

/// Sequential convenience over [`parse_source`] + [`Aggregator`].
pub fn merge_sources<'a>(sources: impl IntoIterator<Item = &'a FetchedSource>) -> Result<Aggregate, SubsError> {
    let mut agg = Aggregator::new();
    for s in sources {
        agg.push(parse_source(s));
    }
    agg.finish()
}
