// src/fetch/mod.rs
pub mod api;
pub mod page;
pub mod sniff;

use anyhow::{Context, Result};
use reqwest::Client;
use std::{path::Path, time::Duration};
use tokio::{fs, time::sleep};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::{Config, SourceMode};
use crate::process::Document;

pub fn build_client(cfg: &Config) -> Result<Client> {
    Client::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(cfg.request_timeout())
        .gzip(true)
        .cookie_store(true)
        .build()
        .context("building HTTP client")
}

pub(crate) async fn get_text_core(client: &Client, url: &Url) -> Result<String> {
    debug!("Fetching text from {}", url);
    client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .text()
        .await
        .with_context(|| format!("Reading text from {}", url))
}

/// Delay before retry number `attempt` (1-based), doubling each time and
/// saturating instead of overflowing.
fn backoff_ms(initial_backoff_ms: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |f| initial_backoff_ms.saturating_mul(f))
}

pub(crate) async fn get_text_with_retry(
    client: &Client,
    url: &Url,
    max_retries: u32,
    initial_backoff_ms: u64,
) -> Result<String> {
    let mut attempts = 0;
    loop {
        match get_text_core(client, url).await {
            Ok(t) => return Ok(t),
            Err(e) if attempts < max_retries => {
                attempts += 1;
                let backoff = backoff_ms(initial_backoff_ms, attempts);
                warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                error!(%url, error = %e, "Exhausted retries");
                return Err(e);
            }
        }
    }
}

pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).with_context(|| format!("invalid URL {:?}", raw))
}

/// Decide between JSON and HTML for a body whose origin gives no hint.
pub fn document_from_text(text: String, json_hint: bool) -> Result<Document> {
    let body = text.trim_start_matches('\u{feff}').trim_start();
    if json_hint || body.starts_with('{') || body.starts_with('[') {
        let value = serde_json::from_str(body).context("decoding JSON document")?;
        Ok(Document::Json(value))
    } else {
        Ok(Document::Html(text))
    }
}

/// Whether a saved file's name says it holds JSON.
pub fn is_json_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Decode a saved document already read from `path`.
pub fn saved_document(path: &Path, text: String) -> Result<Document> {
    document_from_text(text, is_json_path(path)).with_context(|| format!("in {:?}", path))
}

/// Replay a saved page or JSON response.
pub async fn read_document<P: AsRef<Path>>(path: P) -> Result<Document> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {:?}", path))?;
    let doc = saved_document(path, text)?;
    info!(path = %path.display(), kind = doc.kind(), "replayed document");
    Ok(doc)
}

/// Obtain the document for one run, according to `cfg.mode`.
#[instrument(level = "info", skip(cfg), fields(mode = ?cfg.mode))]
pub async fn acquire(cfg: &Config) -> Result<Document> {
    match cfg.mode {
        SourceMode::File => {
            let input = cfg.input.as_ref().context("mode `file` requires `input`")?;
            read_document(input).await
        }
        SourceMode::Html => {
            let client = build_client(cfg)?;
            page::fetch_page(&client, cfg).await.map(Document::Html)
        }
        SourceMode::Api => {
            let client = build_client(cfg)?;
            let raw = cfg.api_url.as_deref().context("mode `api` requires `api_url`")?;
            api::fetch_json(&client, &parse_url(raw)?, cfg)
                .await
                .map(Document::Json)
        }
        SourceMode::Sniff => {
            let client = build_client(cfg)?;
            sniff::sniff_json(&client, cfg).await.map(Document::Json)
        }
    }
}
