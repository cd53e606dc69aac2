//! Run orchestration: gather sources, parse them in parallel, merge in
//! configured order, assemble and write.
//! [Chinese] 运行编排：获取订阅 -> 并行解析 -> 按配置顺序合并 -> 组装 -> 写出。
use crate::cli::Args;
use anyhow::{Context, Result};
use cm_subscribe::aggregate::{parse_source, Aggregator, FetchedSource, MergeReport, SourceOutcome};
use cm_subscribe::assemble::ConfigAssembler;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub out: PathBuf,
    pub written: bool,
    pub dry_run: bool,
    pub proxies: usize,
    pub report: MergeReport,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "task": "subs.merge",
            "out": self.out.display().to_string(),
            "written": self.written,
            "dry_run": self.dry_run,
            "proxies": self.proxies,
            "accepted": self.report.accepted,
            "skipped": self.report.skipped,
            "sources": self.report.sources,
        })
    }
}

fn parse_in_background(source: FetchedSource) -> JoinHandle<SourceOutcome> {
    tokio::task::spawn_blocking(move || parse_source(&source))
}

async fn read_local(path: PathBuf) -> FetchedSource {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match tokio::fs::read(&path).await {
        Ok(bytes) => FetchedSource::ok(name, String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!(source = %name, error = %e, "cannot read input file");
            FetchedSource::failed(name)
        }
    }
}

fn local_tasks(inputs: &[PathBuf]) -> Vec<JoinHandle<Result<SourceOutcome>>> {
    inputs
        .iter()
        .cloned()
        .map(|p| {
            tokio::spawn(async move {
                let src = read_local(p).await;
                parse_in_background(src).await.context("parse worker panicked")
            })
        })
        .collect()
}

#[cfg(feature = "subs_http")]
async fn download(entry: crate::sources::SourceEntry, download_dir: PathBuf, opts: cm_subscribe::http::FetchOptions) -> FetchedSource {
    tracing::info!(source = %entry.filename, url = %entry.url, "downloading");
    match cm_subscribe::http::fetch_text(&entry.url, &opts).await {
        Ok(body) => {
            if let Err(e) = save_raw(&download_dir, &entry.filename, &body).await {
                tracing::warn!(source = %entry.filename, error = %e, "cannot save raw payload");
            }
            FetchedSource::ok(entry.filename, body)
        }
        Err(e) => {
            tracing::warn!(source = %entry.filename, error = %e, "download failed");
            FetchedSource::failed(entry.filename)
        }
    }
}

#[cfg(feature = "subs_http")]
async fn save_raw(dir: &Path, filename: &str, body: &str) -> Result<()> {
    if !crate::sources::is_plain_filename(filename) {
        anyhow::bail!("refusing to save outside {}: {filename:?}", dir.display());
    }
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create {}", dir.display()))?;
    let p = dir.join(filename);
    tokio::fs::write(&p, body)
        .await
        .with_context(|| format!("write {}", p.display()))?;
    tracing::debug!(path = %p.display(), "raw payload saved");
    Ok(())
}

#[cfg(feature = "subs_http")]
fn remote_tasks(args: &Args) -> Result<Vec<JoinHandle<Result<SourceOutcome>>>> {
    let entries = crate::sources::load_sources(&args.config)?;
    let opts = cm_subscribe::http::FetchOptions {
        timeout: std::time::Duration::from_secs(args.timeout),
        retries: args.retries,
        ..Default::default()
    };
    Ok(entries
        .into_iter()
        .map(|entry| {
            let dir = args.download_dir.clone();
            let opts = opts.clone();
            tokio::spawn(async move {
                let src = download(entry, dir, opts).await;
                parse_in_background(src).await.context("parse worker panicked")
            })
        })
        .collect())
}

#[cfg(not(feature = "subs_http"))]
fn remote_tasks(_args: &Args) -> Result<Vec<JoinHandle<Result<SourceOutcome>>>> {
    anyhow::bail!("built without the `subs_http` feature; pass local files with --input")
}

fn normalize(s: &str) -> String {
    s.replace('\r', "").trim_end().to_string()
}

/// Write `text` to `path` unless the file already holds the same content.
/// Returns whether a write happened.
pub async fn write_if_changed(path: &Path, text: &str) -> Result<bool> {
    let unchanged = match tokio::fs::read_to_string(path).await {
        Ok(existing) => normalize(&existing) == normalize(text),
        Err(_) => false,
    };
    if unchanged {
        tracing::info!(path = %path.display(), "merged document unchanged");
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    tokio::fs::write(path, text.as_bytes())
        .await
        .with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = text.len(), "merged document written");
    Ok(true)
}

pub async fn run(args: &Args) -> Result<RunSummary> {
    // 1) One task per source; each fetches (or reads) then parses off the runtime
    // [Chinese] 1) 每个订阅源一个任务：下载/读取后在阻塞线程池解析
    let tasks = if args.input.is_empty() {
        remote_tasks(args)?
    } else {
        local_tasks(&args.input)
    };

    // 2) Await in configured order so output does not depend on timing
    // [Chinese] 2) 按配置顺序等待，结果与完成先后无关
    let mut agg = Aggregator::new();
    for t in tasks {
        let outcome = t.await.context("source task panicked")??;
        agg.push(outcome);
    }
    let report = agg.report();
    tracing::info!(
        sources = report.sources.len(),
        accepted = report.accepted,
        skipped = report.skipped,
        "merge finished"
    );
    let merged = agg.finish()?;

    // 3) Assemble and persist
    // [Chinese] 3) 组装并写出
    let proxies = merged.records.len();
    let doc = ConfigAssembler::builtin().assemble(merged.records)?;
    let text = doc.render()?;
    let out = args.output_path();
    let written = if args.dry_run {
        print!("{text}");
        false
    } else {
        write_if_changed(&out, &text).await?
    };
    Ok(RunSummary {
        out,
        written,
        dry_run: args.dry_run,
        proxies,
        report: merged.report,
    })
}
