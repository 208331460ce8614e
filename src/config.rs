// src/config.rs
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

use crate::cli::Cli;

/// Where the run obtains its document from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Fetch the monitoring page and wait for it to populate.
    #[default]
    Html,
    /// Fetch a known JSON endpoint directly.
    Api,
    /// Fetch the page and probe the data endpoints it references.
    Sniff,
    /// Replay a saved document from disk.
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub mode: SourceMode,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default = "default_wait_marker")]
    pub wait_marker: String,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

fn default_url() -> String {
    "https://rhmzrs.com/kontrola-kvaliteta-vazduha".to_string()
}

fn default_wait_marker() -> String {
    "PM10".to_string()
}

fn default_wait_timeout_secs() -> u64 {
    15
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("aqscraper/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_min_rows() -> usize {
    3
}

fn default_output() -> PathBuf {
    PathBuf::from("air_quality_data.csv")
}

fn default_delimiter() -> char {
    ','
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            mode: SourceMode::default(),
            api_url: None,
            input: None,
            wait_marker: default_wait_marker(),
            wait_timeout_secs: default_wait_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            min_rows: default_min_rows(),
            output: default_output(),
            delimiter: default_delimiter(),
            archive_dir: None,
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        // An empty file deserializes to unit, not a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("parsing YAML configuration")
    }

    /// Defaults, then the YAML file named by `--config`, then flags and
    /// `AQ_*` environment variables.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut cfg = match &cli.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {:?}", path))?;
                Self::from_yaml(&text).with_context(|| format!("in {:?}", path))?
            }
            None => Self::default(),
        };
        cfg.apply(cli);
        cfg.validate()?;
        debug!(?cfg, "configuration loaded");
        Ok(cfg)
    }

    fn apply(&mut self, cli: &Cli) {
        if let Some(v) = &cli.url {
            self.url = v.clone();
        }
        if let Some(v) = cli.mode {
            self.mode = v;
        }
        if let Some(v) = &cli.api_url {
            self.api_url = Some(v.clone());
        }
        if let Some(v) = &cli.input {
            self.input = Some(v.clone());
        }
        if let Some(v) = &cli.wait_marker {
            self.wait_marker = v.clone();
        }
        if let Some(v) = cli.wait_timeout_secs {
            self.wait_timeout_secs = v;
        }
        if let Some(v) = cli.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = cli.min_rows {
            self.min_rows = v;
        }
        if let Some(v) = &cli.output {
            self.output = v.clone();
        }
        if let Some(v) = cli.delimiter {
            self.delimiter = v;
        }
        if let Some(v) = &cli.archive_dir {
            self.archive_dir = Some(v.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.mode {
            SourceMode::Api if self.api_url.is_none() => {
                bail!("mode `api` requires `api_url`")
            }
            SourceMode::File if self.input.is_none() => {
                bail!("mode `file` requires `input`")
            }
            _ => {}
        }
        if self.min_rows == 0 {
            bail!("`min_rows` must be at least 1");
        }
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            bail!("unusable delimiter {:?}", self.delimiter);
        }
        if self.wait_marker.is_empty() {
            bail!("`wait_marker` must not be empty");
        }
        Ok(())
    }

    /// The delimiter as the single byte the CSV writer expects.
    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.delimiter as u8
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_the_monitoring_page() {
        let cfg = Config::default();
        assert_eq!(cfg.mode, SourceMode::Html);
        assert_eq!(cfg.wait_marker, "PM10");
        assert_eq!(cfg.min_rows, 3);
        assert_eq!(cfg.output, PathBuf::from("air_quality_data.csv"));
        assert_eq!(cfg.delimiter_byte(), b',');
        cfg.validate().unwrap();
    }

    #[test]
    fn yaml_fills_gaps_with_defaults() {
        let cfg = Config::from_yaml("mode: api\napi_url: https://example.org/data.json\nmin_rows: 5\n")
            .unwrap();
        assert_eq!(cfg.mode, SourceMode::Api);
        assert_eq!(cfg.min_rows, 5);
        assert_eq!(cfg.wait_timeout_secs, 15);
        assert!(Config::from_yaml("").is_ok());
        assert!(Config::from_yaml("bogus: 1\n").is_err());
    }

    #[test]
    fn cli_overrides_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aq.yaml");
        fs::write(&path, "output: from_yaml.csv\ndelimiter: ';'\n").unwrap();

        let cli = Cli {
            config: Some(path),
            output: Some(PathBuf::from("from_cli.csv")),
            ..Cli::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert_eq!(cfg.output, PathBuf::from("from_cli.csv"));
        assert_eq!(cfg.delimiter_byte(), b';');
    }

    #[test]
    fn validate_rejects_inconsistent_settings() {
        let api = Config {
            mode: SourceMode::Api,
            ..Config::default()
        };
        assert!(api.validate().is_err());

        let file = Config {
            mode: SourceMode::File,
            ..Config::default()
        };
        assert!(file.validate().is_err());

        let zero = Config {
            min_rows: 0,
            ..Config::default()
        };
        assert!(zero.validate().is_err());

        let wide = Config {
            delimiter: 'ч',
            ..Config::default()
        };
        assert!(wide.validate().is_err());
    }
}
