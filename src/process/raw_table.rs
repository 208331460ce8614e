// src/process/raw_table.rs
use serde_json::{Map, Value};

use super::utils::json_cell;

/// One `<table>` (or table-shaped JSON array) as found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    /// Where the candidate came from, e.g. `table[2]` or `$.data`.
    pub label: String,
    /// Header cells, empty when the source had no header row.
    pub headers: Vec<String>,
    /// Body rows, verbatim cell text. Row lengths may differ.
    pub rows: Vec<Vec<String>>,
}

impl RawCandidate {
    /// Widest row, header included.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .chain(self.rows.iter().flatten())
            .map(String::as_str)
    }
}

/// A JSON value whose shape has been discriminated.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonPayload {
    /// `[[...], [...]]` fixed-order value arrays.
    Rows(Vec<Vec<Value>>),
    /// `[{...}, {...}]` keyed records.
    Records(Vec<Map<String, Value>>),
    /// `{"station": {...}, ...}` station id → keyed record, in source order.
    Keyed(Vec<(String, Map<String, Value>)>),
}

impl JsonPayload {
    /// Discriminate the shape of `value`, `None` if it is not table-like.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) if !items.is_empty() => {
                if items.iter().all(Value::is_array) {
                    Some(JsonPayload::Rows(
                        items
                            .iter()
                            .filter_map(|v| v.as_array().cloned())
                            .collect(),
                    ))
                } else if items.iter().all(Value::is_object) {
                    Some(JsonPayload::Records(
                        items
                            .iter()
                            .filter_map(|v| v.as_object().cloned())
                            .collect(),
                    ))
                } else {
                    None
                }
            }
            Value::Object(map) if !map.is_empty() && map.values().all(Value::is_object) => {
                Some(JsonPayload::Keyed(
                    map.iter()
                        .filter_map(|(k, v)| v.as_object().map(|o| (k.clone(), o.clone())))
                        .collect(),
                ))
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            JsonPayload::Rows(r) => r.len(),
            JsonPayload::Records(r) => r.len(),
            JsonPayload::Keyed(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records paired with their station id (only `Keyed` carries one).
    pub fn records(&self) -> Vec<(Option<&str>, &Map<String, Value>)> {
        match self {
            JsonPayload::Rows(_) => Vec::new(),
            JsonPayload::Records(r) => r.iter().map(|m| (None, m)).collect(),
            JsonPayload::Keyed(r) => r.iter().map(|(k, m)| (Some(k.as_str()), m)).collect(),
        }
    }

    /// Field names in first-seen order across all records.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (_, rec) in self.records() {
            for k in rec.keys() {
                if !names.contains(&k.as_str()) {
                    names.push(k);
                }
            }
        }
        names
    }

    /// Flatten into a table. For `Rows` the first array becomes the header
    /// when it holds only strings and the body does not; for records the
    /// header is the field names.
    pub fn to_table(&self, label: &str) -> RawCandidate {
        match self {
            JsonPayload::Rows(rows) => {
                let all_strings = |r: &Vec<Value>| r.iter().all(Value::is_string);
                let has_header = rows.len() > 1
                    && all_strings(&rows[0])
                    && !rows[1..].iter().all(all_strings);
                let mut iter = rows
                    .iter()
                    .map(|r| r.iter().map(json_cell).collect::<Vec<String>>());
                let headers = if has_header {
                    iter.next().unwrap_or_default()
                } else {
                    Vec::new()
                };
                RawCandidate {
                    label: label.to_string(),
                    headers,
                    rows: iter.collect(),
                }
            }
            JsonPayload::Records(_) | JsonPayload::Keyed(_) => {
                let names = self.field_names();
                RawCandidate {
                    label: label.to_string(),
                    headers: names.iter().map(|s| s.to_string()).collect(),
                    rows: self
                        .records()
                        .into_iter()
                        .map(|(_, rec)| {
                            names
                                .iter()
                                .map(|n| rec.get(*n).map(json_cell).unwrap_or_default())
                                .collect()
                        })
                        .collect(),
                }
            }
        }
    }
}

/// A JSON candidate together with its path inside the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonCandidate {
    pub label: String,
    pub payload: JsonPayload,
}

/// Anything that might turn out to be "the data".
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Table(RawCandidate),
    Json(JsonCandidate),
}

impl Candidate {
    pub fn label(&self) -> &str {
        match self {
            Candidate::Table(t) => &t.label,
            Candidate::Json(j) => &j.label,
        }
    }
}

/// Melted `(stationTimeKey, pollutantCode, value)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrowRecord {
    pub key: String,
    pub code: String,
    pub value: String,
}

impl NarrowRecord {
    pub fn new(key: impl Into<String>, code: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code: code.into(),
            value: value.into(),
        }
    }

    /// The first three cells of a row; cells past the third are ignored.
    pub fn from_row(row: &[String]) -> Option<Self> {
        match row {
            [key, code, value, ..] => Some(Self::new(key.trim(), code.trim(), value.trim())),
            _ => None,
        }
    }
}
