// src/schema/types.rs

use std::fmt;

use crate::process::raw_table::RawCandidate;

/// The fixed pollutant vocabulary, in output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PollutantCode {
    O3,
    CO,
    SO2,
    NO,
    NO2,
    NOx,
    PM10,
    PM25,
    H2S,
    C6H6,
}

impl PollutantCode {
    pub const ALL: [PollutantCode; 10] = [
        PollutantCode::O3,
        PollutantCode::CO,
        PollutantCode::SO2,
        PollutantCode::NO,
        PollutantCode::NO2,
        PollutantCode::NOx,
        PollutantCode::PM10,
        PollutantCode::PM25,
        PollutantCode::H2S,
        PollutantCode::C6H6,
    ];

    /// Column name as written to the output file.
    pub fn as_str(self) -> &'static str {
        match self {
            PollutantCode::O3 => "O3",
            PollutantCode::CO => "CO",
            PollutantCode::SO2 => "SO2",
            PollutantCode::NO => "NO",
            PollutantCode::NO2 => "NO2",
            PollutantCode::NOx => "NOx",
            PollutantCode::PM10 => "PM10",
            PollutantCode::PM25 => "PM2.5",
            PollutantCode::H2S => "H2S",
            PollutantCode::C6H6 => "C6H6",
        }
    }

    /// Position inside `ALL` (and inside `CanonicalRow::values`).
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PollutantCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const STATION_LABEL: &str = "Станица";
pub const TIME_LABEL: &str = "Вријеме";

/// Station + time key columns followed by every pollutant.
pub const CANONICAL_WIDTH: usize = 2 + PollutantCode::ALL.len();

/// Width of a melted (key, code, value) layout.
pub const NARROW_WIDTH: usize = 3;

/// A column of the canonical schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalColumn {
    Station,
    Time,
    Pollutant(PollutantCode),
}

impl CanonicalColumn {
    /// All canonical columns in output order.
    pub fn all() -> impl Iterator<Item = CanonicalColumn> {
        [CanonicalColumn::Station, CanonicalColumn::Time]
            .into_iter()
            .chain(PollutantCode::ALL.into_iter().map(CanonicalColumn::Pollutant))
    }

    pub fn label(self) -> &'static str {
        match self {
            CanonicalColumn::Station => STATION_LABEL,
            CanonicalColumn::Time => TIME_LABEL,
            CanonicalColumn::Pollutant(code) => code.as_str(),
        }
    }
}

/// One station/time observation. Missing readings are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRow {
    pub station: String,
    pub time: String,
    pub values: [Option<String>; 10],
}

impl CanonicalRow {
    pub fn new(station: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            time: time.into(),
            values: Default::default(),
        }
    }

    pub fn value(&self, code: PollutantCode) -> Option<&str> {
        self.values[code.index()].as_deref()
    }

    /// Cells in canonical column order, missing readings as empty strings.
    pub fn cells(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(CANONICAL_WIDTH);
        out.push(self.station.as_str());
        out.push(self.time.as_str());
        out.extend(self.values.iter().map(|v| v.as_deref().unwrap_or("")));
        out
    }
}

/// The normalized result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalTable {
    pub rows: Vec<CanonicalRow>,
}

impl CanonicalTable {
    pub fn header() -> Vec<&'static str> {
        CanonicalColumn::all().map(CanonicalColumn::label).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, station: &str, time: &str) -> Option<&CanonicalRow> {
        self.rows
            .iter()
            .find(|r| r.station == station && r.time == time)
    }

    /// Turn the table back into a raw candidate, e.g. to re-normalize a
    /// previously emitted file.
    pub fn to_candidate(&self, label: impl Into<String>) -> RawCandidate {
        RawCandidate {
            label: label.into(),
            headers: Self::header().into_iter().map(String::from).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| r.cells().into_iter().map(String::from).collect())
                .collect(),
        }
    }
}
