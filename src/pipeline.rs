// src/pipeline.rs
use anyhow::Result;
use chrono::Local;
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::ScrapeError;
use crate::fetch;
use crate::history::Archive;
use crate::process::{self, Processed};
use crate::schema::write::write_table;

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub rows: usize,
    pub selected: String,
    pub output: PathBuf,
    pub bytes: u64,
    pub archived: Option<PathBuf>,
}

/// Write the archive snapshot, when configured, then the main output. A
/// failed snapshot leaves the previous output untouched.
pub fn emit(cfg: &Config, processed: &Processed) -> Result<RunReport> {
    let archived = match &cfg.archive_dir {
        Some(dir) => Some(Archive::new(dir)?.record(
            &processed.table,
            cfg.delimiter_byte(),
            &Local::now(),
        )?),
        None => None,
    };
    let bytes = write_table(&cfg.output, &processed.table, cfg.delimiter_byte())?;
    Ok(RunReport {
        rows: processed.table.len(),
        selected: processed.selection.chosen.label.clone(),
        output: cfg.output.clone(),
        bytes,
        archived,
    })
}

/// One run: acquire, process, emit. Nothing is written unless every stage
/// before emission succeeded.
#[instrument(level = "info", skip(cfg), fields(mode = ?cfg.mode, output = %cfg.output.display()))]
pub async fn run(cfg: &Config) -> Result<RunReport> {
    let doc = fetch::acquire(cfg)
        .await
        .map_err(|e| ScrapeError::SourceUnavailable(format!("{e:#}")))?;

    let processed = process::process_document(&doc, cfg.min_rows)?;
    let report = emit(cfg, &processed)?;

    info!(
        rows = report.rows,
        selected = %report.selected,
        bytes = report.bytes,
        "run complete"
    );
    Ok(report)
}
