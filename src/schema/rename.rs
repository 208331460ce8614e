// src/schema/rename.rs
//! Fixed rename table from source field names / header labels to canonical columns.

use super::tokens;
use super::types::{CanonicalColumn, PollutantCode};

/// Keys are folded with [`fold_field`]: lowercase, separators removed.
const RENAMES: &[(&str, CanonicalColumn)] = &[
    // station
    ("stanica", CanonicalColumn::Station),
    ("станица", CanonicalColumn::Station),
    ("mjernastanica", CanonicalColumn::Station),
    ("мјернастаница", CanonicalColumn::Station),
    ("station", CanonicalColumn::Station),
    ("stationname", CanonicalColumn::Station),
    ("lokacija", CanonicalColumn::Station),
    ("локација", CanonicalColumn::Station),
    // time
    ("vrijeme", CanonicalColumn::Time),
    ("вријеме", CanonicalColumn::Time),
    ("vreme", CanonicalColumn::Time),
    ("време", CanonicalColumn::Time),
    ("datumivrijeme", CanonicalColumn::Time),
    ("датумивријеме", CanonicalColumn::Time),
    ("datum", CanonicalColumn::Time),
    ("датум", CanonicalColumn::Time),
    ("time", CanonicalColumn::Time),
    ("datetime", CanonicalColumn::Time),
    ("timestamp", CanonicalColumn::Time),
    ("date", CanonicalColumn::Time),
    // pollutants
    ("o3", CanonicalColumn::Pollutant(PollutantCode::O3)),
    ("ozon", CanonicalColumn::Pollutant(PollutantCode::O3)),
    ("ozone", CanonicalColumn::Pollutant(PollutantCode::O3)),
    ("co", CanonicalColumn::Pollutant(PollutantCode::CO)),
    ("so2", CanonicalColumn::Pollutant(PollutantCode::SO2)),
    ("no", CanonicalColumn::Pollutant(PollutantCode::NO)),
    ("no2", CanonicalColumn::Pollutant(PollutantCode::NO2)),
    ("nox", CanonicalColumn::Pollutant(PollutantCode::NOx)),
    ("pm10", CanonicalColumn::Pollutant(PollutantCode::PM10)),
    ("pm25", CanonicalColumn::Pollutant(PollutantCode::PM25)),
    ("h2s", CanonicalColumn::Pollutant(PollutantCode::H2S)),
    ("c6h6", CanonicalColumn::Pollutant(PollutantCode::C6H6)),
    ("benzen", CanonicalColumn::Pollutant(PollutantCode::C6H6)),
    ("benzene", CanonicalColumn::Pollutant(PollutantCode::C6H6)),
];

/// Lowercase and drop whitespace and `_ - . ,` so `PM2_5`, `pm2.5` and
/// `PM 2,5` all fold to `pm25`.
pub fn fold_field(name: &str) -> String {
    name.chars()
        .filter(|c| !(c.is_whitespace() || matches!(c, '_' | '-' | '.' | ',')))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Look a JSON field name up in the rename table. Unknown fields
/// (coordinates, ids, …) return `None` and are dropped by the caller.
pub fn field_column(name: &str) -> Option<CanonicalColumn> {
    let folded = fold_field(name);
    RENAMES
        .iter()
        .find(|(k, _)| *k == folded)
        .map(|(_, col)| *col)
}

/// Map an HTML header label, which may carry units or longer wording
/// ("PM10 (µg/m³)", "Датум и вријеме мјерења").
pub fn header_column(label: &str) -> Option<CanonicalColumn> {
    if let Some(col) = field_column(label) {
        // A bare "No" or "co" in a header is wording, not a code.
        let bare = matches!(col, CanonicalColumn::Pollutant(_))
            && tokens::detect(label).is_empty()
            && fold_field(label).chars().count() <= 2;
        if !bare {
            return Some(col);
        }
    }
    if let Some(code) = tokens::detect(label).into_iter().next() {
        return Some(CanonicalColumn::Pollutant(code));
    }
    let lower = label.to_lowercase();
    if ["вријеме", "vrijeme", "време", "vreme", "датум", "datum", "time"]
        .iter()
        .any(|w| lower.contains(w))
    {
        return Some(CanonicalColumn::Time);
    }
    if ["станиц", "stanic", "station", "локациј", "lokacij"]
        .iter()
        .any(|w| lower.contains(w))
    {
        return Some(CanonicalColumn::Station);
    }
    None
}
