// src/fetch/api.rs
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::{info, instrument};
use url::Url;

use super::get_text_with_retry;
use crate::config::Config;

/// GET a JSON endpoint and decode its body.
#[instrument(level = "info", skip(client, cfg), fields(%url))]
pub async fn fetch_json(client: &Client, url: &Url, cfg: &Config) -> Result<Value> {
    let body = get_text_with_retry(client, url, cfg.max_retries, cfg.backoff_ms).await?;
    let value: Value = serde_json::from_str(body.trim_start_matches('\u{feff}'))
        .with_context(|| format!("decoding JSON from {}", url))?;
    info!(bytes = body.len(), "decoded JSON response");
    Ok(value)
}
