// src/process/normalize.rs
//! Reshape a selected candidate into the canonical wide table.
//!
//! Duplicate `(key, pollutant)` pairs keep the first non-empty value seen.
//! Later values are ignored, never averaged.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::error::ScrapeError;
use crate::schema::rename;
use crate::schema::types::{
    CanonicalColumn, CanonicalRow, CanonicalTable, PollutantCode, CANONICAL_WIDTH,
};
use crate::schema::tokens;

use super::raw_table::{Candidate, JsonPayload, NarrowRecord, RawCandidate};
use super::select::Layout;
use super::utils::{clean_cell, json_cell, looks_numeric};

/// Row accumulator keyed by (station, time), in first-seen order.
#[derive(Debug, Default)]
struct Pivot {
    index: HashMap<(String, String), usize>,
    rows: Vec<CanonicalRow>,
    duplicates: usize,
}

impl Pivot {
    fn row_mut(&mut self, station: &str, time: &str) -> &mut CanonicalRow {
        let key = (station.to_string(), time.to_string());
        let idx = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                self.rows.push(CanonicalRow::new(station, time));
                self.index.insert(key, self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        &mut self.rows[idx]
    }

    /// Store `value` unless the cell already holds one.
    fn put(&mut self, station: &str, time: &str, code: PollutantCode, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let slot = &mut self.row_mut(station, time).values[code.index()];
        if let Some(first) = slot.as_deref() {
            trace!(station, time, %code, kept = first, ignored = value, "duplicate reading");
            self.duplicates += 1;
        } else {
            *slot = Some(value.to_string());
        }
    }

    fn finish(self) -> CanonicalTable {
        if self.duplicates > 0 {
            debug!(duplicates = self.duplicates, "ignored duplicate readings (first seen wins)");
        }
        CanonicalTable { rows: self.rows }
    }
}

/// Canonical column for each source position.
fn column_mapping(table: &RawCandidate) -> Vec<Option<CanonicalColumn>> {
    let from_header: Vec<Option<CanonicalColumn>> = table
        .headers
        .iter()
        .map(|h| rename::header_column(h))
        .collect();
    let header_names_pollutant = from_header
        .iter()
        .any(|c| matches!(c, Some(CanonicalColumn::Pollutant(_))));

    if header_names_pollutant {
        // Header-aligned: first occurrence of each canonical column wins.
        let mut used: Vec<CanonicalColumn> = Vec::new();
        let mut mapping: Vec<Option<CanonicalColumn>> = from_header
            .into_iter()
            .map(|c| match c {
                Some(col) if !used.contains(&col) => {
                    used.push(col);
                    Some(col)
                }
                _ => None,
            })
            .collect();
        if !used.contains(&CanonicalColumn::Station) && mapping.first() == Some(&None) {
            mapping[0] = Some(CanonicalColumn::Station);
        }
        mapping
    } else {
        // Positional: trim/pad to canonical width.
        CanonicalColumn::all().map(Some).collect()
    }
}

/// Wide rows with unknown column naming.
pub fn normalize_wide(table: &RawCandidate) -> CanonicalTable {
    let mapping = column_mapping(table);
    let mut pivot = Pivot::default();
    let mut dropped = 0usize;

    for row in &table.rows {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if !table.headers.is_empty() && row == &table.headers {
            continue;
        }

        let mut station = "";
        let mut time = "";
        for (cell, col) in row.iter().zip(&mapping) {
            match col {
                Some(CanonicalColumn::Station) => station = cell.trim(),
                Some(CanonicalColumn::Time) => time = cell.trim(),
                _ => {}
            }
        }
        if station.is_empty() && time.is_empty() {
            dropped += 1;
            continue;
        }

        pivot.row_mut(station, time);
        for (cell, col) in row.iter().zip(&mapping) {
            if let Some(CanonicalColumn::Pollutant(code)) = col {
                pivot.put(station, time, *code, cell);
            }
        }
    }

    if dropped > 0 {
        debug!(dropped, label = %table.label, "dropped rows without a key");
    }
    pivot.finish()
}

/// Pivot melted triples. Records with an empty key, an empty or unknown
/// pollutant code are dropped before pivoting.
pub fn normalize_narrow<'a>(records: impl IntoIterator<Item = &'a NarrowRecord>) -> CanonicalTable {
    let mut pivot = Pivot::default();
    let mut dropped = 0usize;

    for rec in records {
        let key = rec.key.trim();
        let code = if key.is_empty() {
            None
        } else {
            tokens::parse_code(&rec.code)
        };
        match code {
            Some(code) => {
                pivot.row_mut(key, "");
                pivot.put(key, "", code, &rec.value);
            }
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, "dropped melted records without key or known code");
    }
    pivot.finish()
}

/// Keyed JSON records. Field names go through the rename table; fields it
/// does not know are dropped. For station-keyed payloads the map key stands
/// in for a missing station field.
pub fn normalize_records<'a>(
    records: impl IntoIterator<Item = (Option<&'a str>, &'a Map<String, Value>)>,
) -> CanonicalTable {
    let mut pivot = Pivot::default();
    let mut unknown: Vec<&str> = Vec::new();

    for (map_key, rec) in records {
        let mut station = String::new();
        let mut time = String::new();
        let mut readings: Vec<(PollutantCode, String)> = Vec::new();

        for (field, value) in rec {
            match rename::field_column(field) {
                Some(CanonicalColumn::Station) if station.is_empty() => station = json_cell(value),
                Some(CanonicalColumn::Time) if time.is_empty() => time = json_cell(value),
                Some(CanonicalColumn::Pollutant(code)) => readings.push((code, json_cell(value))),
                Some(_) => {}
                None => {
                    if !unknown.contains(&field.as_str()) {
                        unknown.push(field);
                    }
                }
            }
        }
        if station.is_empty() {
            station = map_key.map(clean_cell).unwrap_or_default();
        }
        if station.is_empty() && time.is_empty() {
            continue;
        }

        pivot.row_mut(&station, &time);
        for (code, value) in readings {
            pivot.put(&station, &time, code, &value);
        }
    }

    if !unknown.is_empty() {
        debug!(fields = ?unknown, "dropped fields outside the rename table");
    }
    pivot.finish()
}

fn narrow_records(table: &RawCandidate) -> Vec<NarrowRecord> {
    table
        .rows
        .iter()
        .filter_map(|r| NarrowRecord::from_row(r))
        .collect()
}

/// Pollutant columns holding at least one numeric reading.
pub fn observed_codes(table: &CanonicalTable) -> Vec<PollutantCode> {
    PollutantCode::ALL
        .into_iter()
        .filter(|code| {
            table
                .rows
                .iter()
                .any(|r| r.value(*code).map_or(false, looks_numeric))
        })
        .collect()
}

/// Reshape `candidate` according to `layout`.
///
/// Fails with `EmptyTable` when no row survives and with `SchemaMismatch`
/// when no pollutant column ends up with a numeric reading, which means the
/// wrong candidate was selected.
pub fn normalize(candidate: &Candidate, layout: Layout) -> Result<CanonicalTable, ScrapeError> {
    let table = match (candidate, layout) {
        (Candidate::Table(t), Layout::Narrow) => normalize_narrow(&narrow_records(t)),
        (Candidate::Table(t), _) => normalize_wide(t),
        (Candidate::Json(j), Layout::Narrow) => {
            normalize_narrow(&narrow_records(&j.payload.to_table(&j.label)))
        }
        (Candidate::Json(j), Layout::Wide) => normalize_wide(&j.payload.to_table(&j.label)),
        (Candidate::Json(j), Layout::Keyed) => match &j.payload {
            JsonPayload::Rows(_) => normalize_wide(&j.payload.to_table(&j.label)),
            payload => normalize_records(payload.records()),
        },
    };

    let label = candidate.label().to_string();
    if table.is_empty() {
        return Err(ScrapeError::EmptyTable { selected: label });
    }
    let observed = observed_codes(&table);
    if observed.is_empty() {
        warn!(selected = %label, rows = table.len(), "no pollutant column holds a reading");
        return Err(ScrapeError::SchemaMismatch {
            selected: label,
            candidates: Vec::new(),
        });
    }
    debug!(
        rows = table.len(),
        width = CANONICAL_WIDTH,
        observed = ?observed,
        "normalized"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::raw_table::JsonCandidate;
    use crate::schema::write;
    use serde_json::json;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawCandidate {
        RawCandidate {
            label: "table[0]".into(),
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn narrow_pivot_fills_missing_cells() {
        let records = vec![
            NarrowRecord::new("S1", "O3", "10"),
            NarrowRecord::new("S1", "PM10", "5"),
            NarrowRecord::new("S2", "O3", "7"),
        ];
        let table = normalize_narrow(&records);
        assert_eq!(table.len(), 2);
        let keys: Vec<&str> = table.rows.iter().map(|r| r.station.as_str()).collect();
        assert_eq!(keys, vec!["S1", "S2"]);

        let s1 = table.row("S1", "").unwrap();
        assert_eq!(s1.value(PollutantCode::O3), Some("10"));
        assert_eq!(s1.value(PollutantCode::PM10), Some("5"));
        let s2 = table.row("S2", "").unwrap();
        assert_eq!(s2.value(PollutantCode::O3), Some("7"));
        assert_eq!(s2.value(PollutantCode::PM10), None);
    }

    #[test]
    fn duplicate_pair_keeps_first_value() {
        let records = vec![
            NarrowRecord::new("S1", "O3", "10"),
            NarrowRecord::new("S1", "O3", "99"),
        ];
        let table = normalize_narrow(&records);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].value(PollutantCode::O3), Some("10"));
    }

    #[test]
    fn narrow_drops_rows_missing_key_or_code() {
        let records = vec![
            NarrowRecord::new("", "O3", "1"),
            NarrowRecord::new("S1", "", "2"),
            NarrowRecord::new("S1", "Lat", "44.7"),
            NarrowRecord::new("S2", "NO2", "3"),
        ];
        let table = normalize_narrow(&records);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].station, "S2");
    }

    #[test]
    fn keyed_json_uses_rename_table() {
        let payload = JsonPayload::from_value(&json!({
            "BanjaLuka": {"vrijeme": "2024-01-01T00:00", "stanica": "BanjaLuka", "O3": 12, "Lat": 44.7}
        }))
        .unwrap();
        let table = normalize_records(payload.records());
        assert_eq!(table.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.station, "BanjaLuka");
        assert_eq!(row.time, "2024-01-01T00:00");
        assert_eq!(row.value(PollutantCode::O3), Some("12"));

        let populated: Vec<&str> = CanonicalTable::header()
            .into_iter()
            .zip(row.cells())
            .filter(|(_, v)| !v.is_empty())
            .map(|(h, _)| h)
            .collect();
        assert_eq!(populated, vec!["Станица", "Вријеме", "O3"]);
        assert!(!CanonicalTable::header().contains(&"Lat"));
    }

    #[test]
    fn keyed_json_falls_back_to_map_key_for_station() {
        let payload = JsonPayload::from_value(&json!({
            "Добој": {"vrijeme": "10:00", "pm10": 31},
            "Приједор": {"vrijeme": "10:00", "pm10": 77, "pm10 ": 1}
        }))
        .unwrap();
        let table = normalize_records(payload.records());
        assert_eq!(table.len(), 2);
        assert_eq!(table.row("Приједор", "10:00").unwrap().value(PollutantCode::PM10), Some("77"));
    }

    #[test]
    fn record_array_normalizes_without_map_keys() {
        let payload = JsonPayload::from_value(&json!([
            {"stanica": "S1", "vrijeme": "t", "pm10": 5, "lon": 17.2},
            {"stanica": "S2", "vrijeme": "t", "pm10": 9, "so2": "3,1", "lon": 18.4}
        ]))
        .unwrap();
        let c = Candidate::Json(JsonCandidate {
            label: "$".into(),
            payload,
        });
        let table = normalize(&c, Layout::Keyed).unwrap();
        assert_eq!(table.len(), 2);
        let s1 = table.row("S1", "t").unwrap();
        assert_eq!(s1.value(PollutantCode::PM10), Some("5"));
        assert_eq!(s1.value(PollutantCode::SO2), None);
        let s2 = table.row("S2", "t").unwrap();
        assert_eq!(s2.value(PollutantCode::SO2), Some("3,1"));
        for row in &table.rows {
            assert!(row.cells().iter().all(|c| !c.starts_with("17.") && !c.starts_with("18.")));
        }
    }

    #[test]
    fn wide_positional_trims_pads_and_drops_empty_rows() {
        let t = raw(
            &[],
            &[
                &["S1", "10:00", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "extra"],
                &["", "", ""],
                &["S2", "10:00", "11"],
            ],
        );
        let table = normalize_wide(&t);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].value(PollutantCode::C6H6), Some("10"));
        assert_eq!(table.rows[0].cells().len(), CANONICAL_WIDTH);
        assert_eq!(table.rows[1].value(PollutantCode::O3), Some("11"));
        assert_eq!(table.rows[1].value(PollutantCode::CO), None);
    }

    #[test]
    fn wide_header_aligned_when_header_names_pollutants() {
        let t = raw(
            &["Станица", "Датум и вријеме", "PM10 (µg/m³)", "Напомена", "O₃"],
            &[
                &["Бања Лука", "14.12.2024 10:00", "48", "ok", "21"],
                &["Станица", "Датум и вријеме", "PM10 (µg/m³)", "Напомена", "O₃"],
                &["Бања Лука", "14.12.2024 10:00", "99", "dup", "22"],
            ],
        );
        let table = normalize_wide(&t);
        assert_eq!(table.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.value(PollutantCode::PM10), Some("48"));
        assert_eq!(row.value(PollutantCode::O3), Some("21"));
        assert_eq!(row.time, "14.12.2024 10:00");
    }

    #[test]
    fn wrong_candidate_is_a_schema_mismatch() {
        let t = Candidate::Table(raw(&["Материја", "PM10"], &[&["Добар", "низак"]]));
        let err = normalize(&t, Layout::Wide).unwrap_err();
        assert!(matches!(err, ScrapeError::SchemaMismatch { .. }));
    }

    #[test]
    fn header_only_candidate_is_empty() {
        let t = Candidate::Table(raw(&["Станица", "PM10"], &[]));
        let err = normalize(&t, Layout::Wide).unwrap_err();
        assert!(matches!(err, ScrapeError::EmptyTable { .. }));
    }

    #[test]
    fn json_rows_normalize_as_wide() {
        let c = Candidate::Json(JsonCandidate {
            label: "$.rows".into(),
            payload: JsonPayload::from_value(&json!([
                ["stanica", "vrijeme", "PM10"],
                ["S1", "10:00", 12],
                ["S2", "10:00", null]
            ]))
            .unwrap(),
        });
        let table = normalize(&c, Layout::Wide).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].value(PollutantCode::PM10), Some("12"));
        assert_eq!(table.rows[1].value(PollutantCode::PM10), None);
    }

    #[test]
    fn normalizing_canonical_output_is_idempotent() {
        let records = vec![
            NarrowRecord::new("S1", "O3", "10"),
            NarrowRecord::new("S1", "PM2.5", "3,5"),
            NarrowRecord::new("S2", "NOx", "7"),
        ];
        let first = normalize_narrow(&records);
        let bytes_first = write::to_bytes(&first, b',').unwrap();

        let again = Candidate::Table(first.to_candidate("canonical"));
        let second = normalize(&again, Layout::Wide).unwrap();
        let third = normalize(&Candidate::Table(second.to_candidate("canonical")), Layout::Wide)
            .unwrap();

        let bytes_second = write::to_bytes(&second, b',').unwrap();
        let bytes_third = write::to_bytes(&third, b',').unwrap();
        assert_eq!(bytes_first, bytes_second);
        assert_eq!(bytes_second, bytes_third);
    }
}
