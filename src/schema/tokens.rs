// src/schema/tokens.rs
//! Pollutant code detection in free-form cell text.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::PollutantCode;

/// "PM 10", "PM 2,5" → "PM10", "PM2,5"
static PM_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"PM\s+(10|2[.,]5)").unwrap());

/// Accepted spellings, case-sensitive.
const SPELLINGS: &[(&str, PollutantCode)] = &[
    ("O3", PollutantCode::O3),
    ("CO", PollutantCode::CO),
    ("SO2", PollutantCode::SO2),
    ("NO", PollutantCode::NO),
    ("NO2", PollutantCode::NO2),
    ("NOx", PollutantCode::NOx),
    ("NOX", PollutantCode::NOx),
    ("PM10", PollutantCode::PM10),
    ("PM2.5", PollutantCode::PM25),
    ("PM2,5", PollutantCode::PM25),
    ("H2S", PollutantCode::H2S),
    ("C6H6", PollutantCode::C6H6),
];

fn fold_subscripts(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '₀'..='₉' => char::from(b'0' + (c as u32 - '₀' as u32) as u8),
            'ₓ' => 'x',
            _ => c,
        })
        .collect()
}

fn lookup(chunk: &str) -> Option<PollutantCode> {
    SPELLINGS
        .iter()
        .find(|(s, _)| *s == chunk)
        .map(|(_, code)| *code)
}

/// Every distinct pollutant code mentioned in `cell`, in order of appearance.
///
/// Matching is case-sensitive so ordinary words ("No", "co") do not count.
pub fn detect(cell: &str) -> Vec<PollutantCode> {
    let folded = fold_subscripts(cell);
    let folded = PM_GAP.replace_all(&folded, "PM$1");

    let mut found = Vec::new();
    for chunk in folded.split(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == ',')) {
        let chunk = chunk.trim_matches(|c| c == '.' || c == ',');
        if chunk.is_empty() {
            continue;
        }
        if let Some(code) = lookup(chunk) {
            if !found.contains(&code) {
                found.push(code);
            }
        }
    }
    found
}

/// Parse a cell that should hold nothing but a code (the attribute column of
/// a melted table). Case-insensitive.
pub fn parse_code(cell: &str) -> Option<PollutantCode> {
    let folded = fold_subscripts(cell.trim());
    let folded = PM_GAP.replace_all(&folded, "PM$1");
    let upper = folded.to_ascii_uppercase();
    SPELLINGS
        .iter()
        .find(|(s, _)| s.to_ascii_uppercase() == upper)
        .map(|(_, code)| *code)
}
