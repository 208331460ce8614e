// src/fetch/page.rs
use anyhow::{bail, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

use super::{get_text_with_retry, parse_url};
use crate::config::Config;

/// Whether `body` already carries the rendered readings.
pub fn is_populated(body: &str, marker: &str) -> bool {
    body.contains(marker)
}

/// Remaining sleep before the next poll, or `None` once the deadline is spent.
fn next_delay(now: Instant, deadline: Instant, interval: Duration) -> Option<Duration> {
    let left = deadline.checked_duration_since(now)?;
    if left.is_zero() {
        None
    } else {
        Some(interval.min(left))
    }
}

/// GET the monitoring page until its body contains `cfg.wait_marker`.
#[instrument(level = "info", skip(client, cfg), fields(url = %cfg.url))]
pub async fn fetch_page(client: &Client, cfg: &Config) -> Result<String> {
    let url = parse_url(&cfg.url)?;
    let deadline = Instant::now() + cfg.wait_timeout();
    let mut polls = 0u32;

    loop {
        polls += 1;
        let body = get_text_with_retry(client, &url, cfg.max_retries, cfg.backoff_ms).await?;
        if is_populated(&body, &cfg.wait_marker) {
            info!(polls, bytes = body.len(), "page populated");
            return Ok(body);
        }
        debug!(polls, marker = %cfg.wait_marker, "marker not present yet");

        match next_delay(Instant::now(), deadline, cfg.poll_interval()) {
            Some(delay) => sleep(delay).await,
            None => bail!(
                "content did not appear: {:?} not found in {} after {}s ({} polls)",
                cfg.wait_marker,
                url,
                cfg.wait_timeout_secs,
                polls
            ),
        }
    }
}
