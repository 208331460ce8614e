// src/fetch/sniff.rs
//
// Endpoint discovery for pages that fill their tables from a JSON call.
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use super::{get_text_with_retry, parse_url};
use crate::config::Config;

/// Quoted strings that look like paths or URLs, in attributes or scripts.
static QUOTED_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']((?:https?:)?/{0,2}[A-Za-z0-9_\-./?=&%:~+]+)["']"#).expect("valid regex")
});

static DATA_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\.json\b|/api/|\bapi\b|ajax|data)").expect("valid regex"));

static STATIC_ASSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(css|js|png|jpe?g|gif|svg|ico|woff2?|ttf|eot|webp|pdf|mp4)$")
        .expect("valid regex")
});

fn looks_like_endpoint(path: &str) -> bool {
    DATA_HINT.is_match(path) && !STATIC_ASSET.is_match(path)
}

/// Case-insensitive, so `pm10` field names count for a `PM10` marker.
pub fn mentions_marker(body: &str, marker: &str) -> bool {
    body.to_lowercase().contains(&marker.to_lowercase())
}

/// Candidate data endpoints referenced by `html`, resolved against `base`,
/// in document order without repeats.
pub fn discover_endpoints(html: &str, base: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for caps in QUOTED_URL.captures_iter(html) {
        let raw = &caps[1];
        if !raw.contains('/') && !raw.ends_with(".json") {
            continue;
        }
        let Ok(full) = base.join(raw) else {
            continue;
        };
        if !matches!(full.scheme(), "http" | "https") || !looks_like_endpoint(full.path()) {
            continue;
        }
        if seen.insert(full.as_str().to_string()) {
            trace!(url = %full, "candidate endpoint");
            out.push(full);
        }
    }
    out
}

/// Fetch the page, then each discovered endpoint in order, returning the
/// first JSON body that mentions the wait marker.
#[instrument(level = "info", skip(client, cfg), fields(url = %cfg.url))]
pub async fn sniff_json(client: &Client, cfg: &Config) -> Result<Value> {
    let page_url = parse_url(&cfg.url)?;
    let html = get_text_with_retry(client, &page_url, cfg.max_retries, cfg.backoff_ms).await?;
    let endpoints = discover_endpoints(&html, &page_url);
    info!(count = endpoints.len(), "discovered endpoints");

    for endpoint in &endpoints {
        let body = match get_text_with_retry(client, endpoint, 0, cfg.backoff_ms).await {
            Ok(b) => b,
            Err(e) => {
                warn!(%endpoint, error = %e, "endpoint unreachable");
                continue;
            }
        };
        if !mentions_marker(&body, &cfg.wait_marker) {
            debug!(%endpoint, "no marker in response");
            continue;
        }
        match serde_json::from_str::<Value>(body.trim_start_matches('\u{feff}')) {
            Ok(value) => {
                info!(%endpoint, bytes = body.len(), "using sniffed endpoint");
                return Ok(value);
            }
            Err(e) => debug!(%endpoint, error = %e, "not JSON"),
        }
    }

    Err(anyhow!(
        "no data endpoint found on {} ({} probed)",
        page_url,
        endpoints.len()
    ))
}
