use serde_json::Value;

/// Collapse runs of whitespace (including NBSP) into single spaces and trim.
pub fn clean_cell(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cell text for a JSON scalar. Nested arrays/objects and null become empty.
pub fn json_cell(v: &Value) -> String {
    match v {
        Value::String(s) => clean_cell(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// A reading such as `12`, `12,5`, `<5` or `-3.1e2`.
pub fn looks_numeric(s: &str) -> bool {
    let s = s.trim().trim_start_matches(['<', '>', '~']).trim();
    !s.is_empty() && s.replace(',', ".").parse::<f64>().is_ok()
}
