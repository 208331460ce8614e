// src/process/mod.rs
pub mod extract;
pub mod normalize;
pub mod raw_table;
pub mod select;
pub mod utils;

use serde_json::Value;
use tracing::instrument;

use crate::error::ScrapeError;
use crate::schema::types::CanonicalTable;

pub use raw_table::{Candidate, JsonCandidate, JsonPayload, NarrowRecord, RawCandidate};
pub use select::{CandidateProfile, Layout, Selection, SelectionTrace};

/// What acquisition handed over. HTML and JSON paths are mutually exclusive
/// within one run.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Html(String),
    Json(Value),
}

impl Document {
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Html(_) => "html",
            Document::Json(_) => "json",
        }
    }
}

/// Extraction step: every candidate the document contains.
pub fn extract_candidates(doc: &Document) -> Result<Vec<Candidate>, ScrapeError> {
    match doc {
        Document::Html(html) => Ok(extract::html_tables(html)?
            .into_iter()
            .map(Candidate::Table)
            .collect()),
        Document::Json(value) => Ok(extract::json_candidates(value)?
            .into_iter()
            .map(Candidate::Json)
            .collect()),
    }
}

/// Result of the core for one document.
#[derive(Debug, Clone)]
pub struct Processed {
    pub table: CanonicalTable,
    pub selection: Selection,
}

/// Extraction → selection → normalization. Pure; performs no I/O.
#[instrument(level = "info", skip(doc), fields(kind = doc.kind()))]
pub fn process_document(doc: &Document, min_rows: usize) -> Result<Processed, ScrapeError> {
    let candidates = extract_candidates(doc)?;
    let selection = select::select_candidate(&candidates, min_rows)?;

    let chosen = &candidates[selection.chosen.index];
    let table = normalize::normalize(chosen, selection.chosen.layout)
        .map_err(|e| e.with_candidates(&selection.profiles))?;

    Ok(Processed { table, selection })
}
