use std::path::PathBuf;

use clap::Parser;

use crate::config::SourceMode;

/// Every override is optional; unset flags fall through to the YAML file and
/// then to built-in defaults.
#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "aqscraper",
    version,
    about = "Scrape the air-quality monitoring page into a canonical CSV table"
)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(long, env = "AQ_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "AQ_URL")]
    pub url: Option<String>,

    #[arg(long, value_enum, env = "AQ_MODE")]
    pub mode: Option<SourceMode>,

    #[arg(long, env = "AQ_API_URL")]
    pub api_url: Option<String>,

    /// Saved page or JSON document, for `--mode file`.
    #[arg(long, env = "AQ_INPUT")]
    pub input: Option<PathBuf>,

    #[arg(long, env = "AQ_WAIT_MARKER")]
    pub wait_marker: Option<String>,

    #[arg(long, env = "AQ_WAIT_TIMEOUT_SECS")]
    pub wait_timeout_secs: Option<u64>,

    #[arg(long, env = "AQ_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    #[arg(long, env = "AQ_MIN_ROWS")]
    pub min_rows: Option<usize>,

    #[arg(long, short, env = "AQ_OUTPUT")]
    pub output: Option<PathBuf>,

    #[arg(long, env = "AQ_DELIMITER")]
    pub delimiter: Option<char>,

    #[arg(long, env = "AQ_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,
}
