// src/error.rs
use std::fmt;

use crate::process::select::CandidateProfile;

/// Pipeline stage a terminal error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquisition,
    Extraction,
    Selection,
    Normalization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Acquisition => "acquisition",
            Stage::Extraction => "extraction",
            Stage::Selection => "selection",
            Stage::Normalization => "normalization",
        })
    }
}

fn summarize(candidates: &[CandidateProfile]) -> String {
    candidates
        .iter()
        .map(|c| format!("\n  - {}", c))
        .collect()
}

/// Terminal conditions of a run. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("acquisition failed: source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("extraction failed: no {kind} found in source")]
    NoCandidatesFound { kind: &'static str },

    #[error(
        "selection failed: none of {} candidates contains a pollutant code{}",
        .candidates.len(),
        summarize(.candidates)
    )]
    AmbiguousCandidate { candidates: Vec<CandidateProfile> },

    #[error(
        "normalization failed: `{selected}` produced no pollutant readings{}",
        summarize(.candidates)
    )]
    SchemaMismatch {
        selected: String,
        candidates: Vec<CandidateProfile>,
    },

    #[error("normalization failed: `{selected}` produced no rows")]
    EmptyTable { selected: String },
}

impl ScrapeError {
    pub fn stage(&self) -> Stage {
        match self {
            ScrapeError::SourceUnavailable(_) => Stage::Acquisition,
            ScrapeError::NoCandidatesFound { .. } => Stage::Extraction,
            ScrapeError::AmbiguousCandidate { .. } => Stage::Selection,
            ScrapeError::SchemaMismatch { .. } | ScrapeError::EmptyTable { .. } => {
                Stage::Normalization
            }
        }
    }

    /// Structural summaries attached to the error, if any.
    pub fn candidates(&self) -> &[CandidateProfile] {
        match self {
            ScrapeError::AmbiguousCandidate { candidates }
            | ScrapeError::SchemaMismatch { candidates, .. } => candidates,
            _ => &[],
        }
    }

    /// Attach the profiles of every candidate considered in the run.
    pub fn with_candidates(self, all: &[CandidateProfile]) -> Self {
        match self {
            ScrapeError::SchemaMismatch { selected, .. } => ScrapeError::SchemaMismatch {
                selected,
                candidates: all.to_vec(),
            },
            other => other,
        }
    }
}
