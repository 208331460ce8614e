// src/process/select.rs
//! Candidate selection: an ordered rule chain over structural and content
//! signals. Document position is only ever the final tie-break.

use std::fmt;

use tracing::{debug, info, instrument};

use crate::error::ScrapeError;
use crate::schema::rename;
use crate::schema::tokens;
use crate::schema::types::{CanonicalColumn, PollutantCode, CANONICAL_WIDTH, NARROW_WIDTH};

use super::raw_table::{Candidate, JsonPayload, RawCandidate};

/// Raw layout of a candidate, which decides the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One row per observation, columns of unknown naming.
    Wide,
    /// `(key, code, value)` triples.
    Narrow,
    /// JSON records whose field names go through the rename table.
    Keyed,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layout::Wide => "wide",
            Layout::Narrow => "narrow",
            Layout::Keyed => "keyed",
        })
    }
}

/// Structural summary of one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateProfile {
    /// Position in extraction order. Used only as the last tie-break.
    pub index: usize,
    pub label: String,
    pub layout: Layout,
    /// Data rows, header excluded.
    pub rows: usize,
    pub columns: usize,
    /// Distinct pollutant codes seen in header or body, vocabulary order.
    pub tokens: Vec<PollutantCode>,
}

impl fmt::Display for CandidateProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.tokens.iter().map(|t| t.as_str()).collect();
        write!(
            f,
            "{}: {} rows x {} cols, {}, tokens [{}]",
            self.label,
            self.rows,
            self.columns,
            self.layout,
            tokens.join(", ")
        )
    }
}

fn collect_tokens<'a>(cells: impl Iterator<Item = &'a str>) -> Vec<PollutantCode> {
    let mut seen = [false; 10];
    for cell in cells {
        for code in tokens::detect(cell) {
            seen[code.index()] = true;
        }
    }
    PollutantCode::ALL
        .into_iter()
        .filter(|c| seen[c.index()])
        .collect()
}

/// Whether a three-column table carries codes in its middle column.
pub fn is_narrow(table: &RawCandidate) -> bool {
    if table.width() != NARROW_WIDTH {
        return false;
    }
    let header_codes: usize = table.headers.iter().map(|h| tokens::detect(h).len()).sum();
    if header_codes > 1 {
        return false;
    }
    let filled: Vec<&Vec<String>> = table
        .rows
        .iter()
        .filter(|r| r.iter().any(|c| !c.is_empty()))
        .collect();
    let coded = filled
        .iter()
        .filter(|r| r.get(1).and_then(|c| tokens::parse_code(c)).is_some())
        .count();
    coded > 0 && coded * 2 >= filled.len()
}

fn payload_layout(payload: &JsonPayload, label: &str) -> Layout {
    match payload {
        JsonPayload::Rows(_) => {
            if is_narrow(&payload.to_table(label)) {
                Layout::Narrow
            } else {
                Layout::Wide
            }
        }
        JsonPayload::Records(_) | JsonPayload::Keyed(_) => {
            let names_pollutant = payload
                .field_names()
                .iter()
                .any(|f| matches!(rename::field_column(f), Some(CanonicalColumn::Pollutant(_))));
            if !names_pollutant && is_narrow(&payload.to_table(label)) {
                Layout::Narrow
            } else {
                Layout::Keyed
            }
        }
    }
}

/// Measure a candidate: layout, size and the pollutant codes it mentions.
pub fn profile(index: usize, candidate: &Candidate) -> CandidateProfile {
    match candidate {
        Candidate::Table(t) => CandidateProfile {
            index,
            label: t.label.clone(),
            layout: if is_narrow(t) {
                Layout::Narrow
            } else {
                Layout::Wide
            },
            rows: t.rows.len(),
            columns: t.width(),
            tokens: collect_tokens(t.cells()),
        },
        Candidate::Json(j) => {
            let table = j.payload.to_table(&j.label);
            let layout = payload_layout(&j.payload, &j.label);
            // Field names are folded through the rename table so `pm10` counts.
            let field_codes = j.payload.field_names().into_iter().filter_map(|f| {
                match rename::field_column(f) {
                    Some(CanonicalColumn::Pollutant(c)) => Some(c.as_str()),
                    _ => None,
                }
            });
            CandidateProfile {
                index,
                label: j.label.clone(),
                layout,
                rows: table.rows.len(),
                columns: table.width(),
                tokens: collect_tokens(table.cells().chain(field_codes)),
            }
        }
    }
}

/// Selection rules, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    ContentSignature,
    Shape,
    Size,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rule::ContentSignature => "content-signature",
            Rule::Shape => "shape",
            Rule::Size => "size",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub candidate: String,
    pub rule: Rule,
    pub accepted: bool,
    pub reason: String,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.rule,
            self.candidate,
            if self.accepted { "kept" } else { "rejected" },
            self.reason
        )
    }
}

/// Every verdict the rule chain reached, for operator troubleshooting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTrace {
    pub entries: Vec<TraceEntry>,
}

impl SelectionTrace {
    fn record(&mut self, p: &CandidateProfile, rule: Rule, accepted: bool, reason: String) {
        debug!(
            candidate = %p.label,
            %rule,
            accepted,
            reason = %reason,
            "selection verdict"
        );
        self.entries.push(TraceEntry {
            candidate: p.label.clone(),
            rule,
            accepted,
            reason,
        });
    }

    /// Verdicts for one candidate.
    pub fn for_candidate<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a TraceEntry> {
        self.entries.iter().filter(move |e| e.candidate == label)
    }
}

/// Outcome of a successful selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub chosen: CandidateProfile,
    pub profiles: Vec<CandidateProfile>,
    pub trace: SelectionTrace,
}

fn shape_matches(p: &CandidateProfile) -> bool {
    p.columns == CANONICAL_WIDTH || (p.columns == NARROW_WIDTH && p.layout == Layout::Narrow)
}

/// Pick the one candidate holding current readings.
///
/// 1. content signature: at least one pollutant code in header or body;
///    candidates without one are never chosen.
/// 2. shape: canonical width, or a three-column melt.
/// 3. size: most data rows among those meeting `min_rows`; more distinct
///    codes, then extraction order, break remaining ties.
///
/// A rule that no remaining candidate satisfies is skipped rather than
/// emptying the pool, except rule 1 which fails with `AmbiguousCandidate`.
#[instrument(level = "info", skip(candidates), fields(candidates = candidates.len()))]
pub fn select_candidate(
    candidates: &[Candidate],
    min_rows: usize,
) -> Result<Selection, ScrapeError> {
    let profiles: Vec<CandidateProfile> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| profile(i, c))
        .collect();
    let mut trace = SelectionTrace::default();

    // 1) content signature
    let mut pool: Vec<&CandidateProfile> = Vec::new();
    for p in &profiles {
        if p.tokens.is_empty() {
            trace.record(p, Rule::ContentSignature, false, "no pollutant code".into());
        } else {
            let found: Vec<&str> = p.tokens.iter().map(|t| t.as_str()).collect();
            trace.record(
                p,
                Rule::ContentSignature,
                true,
                format!("mentions {}", found.join(", ")),
            );
            pool.push(p);
        }
    }
    if pool.is_empty() {
        return Err(ScrapeError::AmbiguousCandidate {
            candidates: profiles,
        });
    }

    // 2) shape
    if pool.len() > 1 {
        let shaped = pool.iter().filter(|p| shape_matches(p)).count();
        if shaped > 0 && shaped < pool.len() {
            pool.retain(|p| {
                let ok = shape_matches(p);
                let reason = if ok {
                    format!("{} columns, {}", p.columns, p.layout)
                } else {
                    format!(
                        "{} columns, expected {} or a {}-column melt",
                        p.columns, CANONICAL_WIDTH, NARROW_WIDTH
                    )
                };
                trace.record(p, Rule::Shape, ok, reason);
                ok
            });
        } else {
            for p in &pool {
                trace.record(p, Rule::Shape, true, "shape not decisive".into());
            }
        }
    }

    // 3) size
    if pool.len() > 1 {
        let sized = pool.iter().filter(|p| p.rows >= min_rows).count();
        if sized > 0 && sized < pool.len() {
            pool.retain(|p| {
                let ok = p.rows >= min_rows;
                if !ok {
                    trace.record(
                        p,
                        Rule::Size,
                        false,
                        format!("{} rows below floor of {}", p.rows, min_rows),
                    );
                }
                ok
            });
        }
    }
    let Some(best) = pool.iter().copied().min_by(|a, b| {
        b.rows
            .cmp(&a.rows)
            .then(b.tokens.len().cmp(&a.tokens.len()))
            .then(a.index.cmp(&b.index))
    }) else {
        return Err(ScrapeError::AmbiguousCandidate {
            candidates: profiles,
        });
    };
    for p in &pool {
        if p.index == best.index {
            let reason = if p.rows < min_rows {
                format!("{} rows, floor of {} unmet by every candidate", p.rows, min_rows)
            } else {
                format!("{} rows", p.rows)
            };
            trace.record(p, Rule::Size, true, reason);
        } else {
            trace.record(
                p,
                Rule::Size,
                false,
                format!("{} rows, {} codes; {} preferred", p.rows, p.tokens.len(), best.label),
            );
        }
    }

    let chosen = best.clone();
    info!(
        chosen = %chosen.label,
        layout = %chosen.layout,
        rows = chosen.rows,
        cols = chosen.columns,
        "selected candidate"
    );
    Ok(Selection {
        chosen,
        profiles,
        trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::raw_table::JsonCandidate;
    use serde_json::json;

    fn table(label: &str, headers: &[&str], rows: &[&[&str]]) -> Candidate {
        Candidate::Table(RawCandidate {
            label: label.into(),
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        })
    }

    #[test]
    fn token_match_beats_position_and_size() {
        let row: &[&str] = &["a", "b", "c"];
        let filler = vec![row; 50];
        let candidates = vec![
            table("table[0]", &["x", "y", "z"], &filler),
            table(
                "table[1]",
                &["Станица", "PM10"],
                &[&["Бања Лука", "48"], &["Добој", "31"]],
            ),
        ];
        let sel = select_candidate(&candidates, 3).unwrap();
        assert_eq!(sel.chosen.label, "table[1]");
        assert_eq!(sel.chosen.tokens, vec![PollutantCode::PM10]);
    }

    #[test]
    fn canonical_width_without_tokens_is_never_chosen() {
        let wide_row: Vec<&str> = vec!["1"; CANONICAL_WIDTH];
        let wide_rows = vec![wide_row.as_slice(); 40];
        let candidates = vec![
            table("table[0]", &[], &wide_rows),
            table("table[1]", &[], &[&["S1", "O3", "10"]]),
        ];
        let sel = select_candidate(&candidates, 3).unwrap();
        assert_eq!(sel.chosen.label, "table[1]");
        assert_eq!(sel.chosen.layout, Layout::Narrow);
    }

    #[test]
    fn no_tokens_anywhere_is_ambiguous() {
        let candidates = vec![
            table("table[0]", &["a"], &[&["1"]]),
            table("table[1]", &["b", "c"], &[&["2", "3"]]),
        ];
        let err = select_candidate(&candidates, 1).unwrap_err();
        match err {
            ScrapeError::AmbiguousCandidate { candidates } => {
                assert_eq!(candidates.len(), 2);
                assert_eq!(candidates[1].columns, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shape_then_size_break_ties() {
        let canonical: Vec<&str> = vec![
            "Станица", "Вријеме", "O3", "CO", "SO2", "NO", "NO2", "NOx", "PM10", "PM2.5", "H2S",
            "C6H6",
        ];
        let wide_row: Vec<&str> = vec!["1"; CANONICAL_WIDTH];
        let candidates = vec![
            // limit-value legend: tokens, but in the first column and many rows
            table(
                "table[0]",
                &["Материја", "Граница"],
                &[&["O3", "120"], &["PM10", "50"], &["SO2", "350"], &["NO2", "200"]],
            ),
            table("table[1]", &canonical, &vec![wide_row.as_slice(); 3]),
        ];
        let sel = select_candidate(&candidates, 3).unwrap();
        assert_eq!(sel.chosen.label, "table[1]");
        assert!(sel
            .trace
            .for_candidate("table[0]")
            .any(|e| e.rule == Rule::Shape && !e.accepted));
    }

    #[test]
    fn size_floor_rejects_summary_tables() {
        let candidates = vec![
            table("table[0]", &["Станица", "PM10", "O3", "NO2"], &[&["Просјек", "40", "2", "3"]]),
            table(
                "table[1]",
                &["Станица", "PM10"],
                &[&["A", "1"], &["B", "2"], &["C", "3"]],
            ),
        ];
        let sel = select_candidate(&candidates, 3).unwrap();
        assert_eq!(sel.chosen.label, "table[1]");
    }

    #[test]
    fn floor_never_turns_a_match_into_a_failure() {
        let candidates = vec![table("table[0]", &["PM10"], &[])];
        let sel = select_candidate(&candidates, 3).unwrap();
        assert_eq!(sel.chosen.rows, 0);
    }

    #[test]
    fn json_field_names_count_as_tokens() {
        let payload = JsonPayload::from_value(&json!({
            "BanjaLuka": {"vrijeme": "2024-01-01T00:00", "stanica": "BanjaLuka", "o3": 12, "Lat": 44.7}
        }))
        .unwrap();
        let candidates = vec![Candidate::Json(JsonCandidate {
            label: "$".into(),
            payload,
        })];
        let sel = select_candidate(&candidates, 1).unwrap();
        assert_eq!(sel.chosen.layout, Layout::Keyed);
        assert_eq!(sel.chosen.tokens, vec![PollutantCode::O3]);
    }

    #[test]
    fn trace_covers_every_candidate() {
        let candidates = vec![
            table("table[0]", &["a"], &[&["1"]]),
            table("table[1]", &["PM10"], &[&["1"], &["2"], &["3"]]),
        ];
        let sel = select_candidate(&candidates, 3).unwrap();
        assert!(sel.trace.for_candidate("table[0]").any(|e| !e.accepted));
        assert!(sel.trace.for_candidate("table[1]").all(|e| e.accepted));
    }
}
