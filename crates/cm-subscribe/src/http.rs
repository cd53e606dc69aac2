//! Subscription downloader: one GET per source with bounded retries.
//! [Chinese] 订阅下载：每个订阅源一次 GET，带有限次数的重试与指数退避。
use crate::model::SubsError;
use reqwest::StatusCode;
use std::time::Duration;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const ACCEPT: &str = "application/x-yaml, application/yaml, text/yaml, */*";

const RETRY_STATUS: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub backoff: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

enum Attempt {
    Done(String),
    Retry(String),
    Fatal(String),
}

fn build_client(opts: &FetchOptions) -> Result<reqwest::Client, SubsError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(opts.timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SubsError::Fetch(format!("client: {e}")))
}

async fn attempt(client: &reqwest::Client, url: &url::Url) -> Attempt {
    let resp = match client
        .get(url.clone())
        .header(reqwest::header::ACCEPT, ACCEPT)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) if e.is_connect() || e.is_timeout() => return Attempt::Retry(e.to_string()),
        Err(e) => return Attempt::Fatal(e.to_string()),
    };
    let status = resp.status();
    if RETRY_STATUS.contains(&status) {
        return Attempt::Retry(format!("http status {status}"));
    }
    if !status.is_success() {
        return Attempt::Fatal(format!("http status {status}"));
    }
    match resp.text().await {
        Ok(body) if body.trim().is_empty() => Attempt::Fatal("empty body".into()),
        Ok(body) => Attempt::Done(body),
        Err(e) if e.is_timeout() => Attempt::Retry(e.to_string()),
        Err(e) => Attempt::Fatal(e.to_string()),
    }
}

/// Fetch one subscription payload as text.
pub async fn fetch_text(raw_url: &str, opts: &FetchOptions) -> Result<String, SubsError> {
    let url = url::Url::parse(raw_url).map_err(|e| SubsError::Fetch(format!("invalid url {raw_url}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SubsError::Fetch(format!("unsupported scheme {}", url.scheme())));
    }
    let client = build_client(opts)?;
    let mut delay = opts.backoff;
    let mut tries = 0u32;
    loop {
        tries += 1;
        match attempt(&client, &url).await {
            Attempt::Done(body) => {
                tracing::debug!(url = %url, bytes = body.len(), tries, "fetched");
                return Ok(body);
            }
            Attempt::Fatal(reason) => return Err(SubsError::Fetch(reason)),
            Attempt::Retry(reason) if tries > opts.retries => {
                return Err(SubsError::Fetch(format!("{reason} (after {tries} attempts)")));
            }
            Attempt::Retry(reason) => {
                tracing::warn!(url = %url, attempt = tries, reason = %reason, delay_ms = delay.as_millis() as u64, "retrying fetch");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
    }
}
