// src/process/extract.rs
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::ScrapeError;
use crate::schema::rename;

use super::raw_table::{JsonCandidate, JsonPayload, RawCandidate};
use super::utils::{clean_cell, looks_numeric};

const MAX_SPAN: usize = 64;
const MAX_JSON_DEPTH: usize = 6;

fn is_table(el: &ElementRef) -> bool {
    el.value().name() == "table"
}

/// Closest enclosing `<table>` of any node.
fn owning_table<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors().filter_map(ElementRef::wrap).find(is_table)
}

fn in_thead(el: &ElementRef, table: ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|e| *e != table)
        .any(|e| e.value().name() == "thead")
}

/// Text of a cell without the text of any table nested inside it.
fn cell_text(cell: &ElementRef, table: ElementRef) -> String {
    let mut buf = String::new();
    for node in cell.descendants() {
        let nested = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(is_table)
            .map_or(false, |t| t != table);
        if nested {
            continue;
        }
        if let Some(text) = node.value().as_text() {
            buf.push_str(text);
        } else if let Some(el) = node.value().as_element() {
            if matches!(el.name(), "br" | "p" | "div" | "li") {
                buf.push(' ');
            }
        }
    }
    clean_cell(&buf)
}

struct ParsedRow {
    cells: Vec<String>,
    header: bool,
}

/// Cells from earlier rows that still cover a column via `rowspan`.
#[derive(Default)]
struct SpanGrid {
    pending: Vec<Option<(String, usize)>>,
}

impl SpanGrid {
    fn cover(&mut self, col: usize, text: String, rows: usize) {
        if self.pending.len() <= col {
            self.pending.resize(col + 1, None);
        }
        self.pending[col] = Some((text, rows));
    }

    /// Text spanning into `col` of the current row, if any.
    fn take(&mut self, col: usize) -> Option<String> {
        let slot = self.pending.get_mut(col)?;
        let (text, left) = slot.as_mut()?;
        let text = text.clone();
        *left -= 1;
        if *left == 0 {
            *slot = None;
        }
        Some(text)
    }

    fn covers_from(&self, col: usize) -> bool {
        self.pending.iter().skip(col).any(Option::is_some)
    }
}

fn span_attr(cell: &ElementRef, name: &str) -> usize {
    cell.value()
        .attr(name)
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

/// One `<tr>` laid out on the column grid. Header rows repeat a `colspan`
/// label in every column it covers; body rows pad with empty cells.
fn parse_row(tr: &ElementRef, table: ElementRef, grid: &mut SpanGrid) -> Option<ParsedRow> {
    let own: Vec<ElementRef> = tr
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .collect();
    let all_th = !own.is_empty() && own.iter().all(|c| c.value().name() == "th");
    let header = all_th || (!own.is_empty() && in_thead(tr, table));

    let mut cells = Vec::new();
    for cell in &own {
        while let Some(text) = grid.take(cells.len()) {
            cells.push(text);
        }
        let text = cell_text(cell, table);
        let rowspan = span_attr(cell, "rowspan");
        for k in 0..span_attr(cell, "colspan") {
            let t = if k == 0 || header { text.clone() } else { String::new() };
            if rowspan > 1 {
                grid.cover(cells.len(), t.clone(), rowspan - 1);
            }
            cells.push(t);
        }
    }
    while grid.covers_from(cells.len()) {
        let text = grid.take(cells.len()).unwrap_or_default();
        cells.push(text);
    }

    if cells.is_empty() {
        None
    } else {
        Some(ParsedRow { cells, header })
    }
}

/// A header row holding one label across every column, e.g. a caption.
fn is_caption(row: &[String]) -> bool {
    let mut labels = row.iter().filter(|c| !c.is_empty());
    match labels.next() {
        Some(first) => row.len() > 1 && labels.all(|c| c == first),
        None => true,
    }
}

/// Stack the leading header rows column by column.
fn merge_headers(rows: &[ParsedRow]) -> Vec<String> {
    let stacked: Vec<&ParsedRow> = if rows.len() > 1 {
        rows.iter().filter(|r| !is_caption(&r.cells)).collect()
    } else {
        rows.iter().collect()
    };
    let width = stacked.iter().map(|r| r.cells.len()).max().unwrap_or(0);
    (0..width)
        .map(|col| {
            let mut parts: Vec<&str> = Vec::new();
            for r in &stacked {
                match r.cells.get(col).map(String::as_str) {
                    Some(c) if !c.is_empty() && parts.last() != Some(&c) => parts.push(c),
                    _ => {}
                }
            }
            parts.join(" ")
        })
        .collect()
}

/// A `<td>` first row that labels the columns rather than holding readings.
fn labels_columns(row: &[String]) -> bool {
    let mapped = row
        .iter()
        .filter(|c| rename::header_column(c).is_some())
        .count();
    mapped >= 2 && !row.iter().any(|c| looks_numeric(c))
}

fn parse_table(table: ElementRef, tr_sel: &Selector, index: usize) -> Option<RawCandidate> {
    let mut grid = SpanGrid::default();
    let parsed: Vec<ParsedRow> = table
        .select(tr_sel)
        .filter(|tr| owning_table(tr) == Some(table))
        .filter_map(|tr| parse_row(&tr, table, &mut grid))
        .collect();

    if parsed.is_empty() {
        return None;
    }

    let lead = parsed.iter().take_while(|r| r.header).count();
    let mut headers = merge_headers(&parsed[..lead]);
    let mut rows: Vec<Vec<String>> = parsed
        .into_iter()
        .skip(lead)
        .filter(|r| !r.header)
        .map(|r| r.cells)
        .collect();

    if headers.is_empty() {
        if let Some(first) = rows.iter().position(|r| r.iter().any(|c| !c.is_empty())) {
            if labels_columns(&rows[first]) {
                headers = rows.remove(first);
            }
        }
    }

    Some(RawCandidate {
        label: format!("table[{}]", index),
        headers,
        rows,
    })
}

/// Parse every `<table>` in `html` independently, in document order.
///
/// Cell text is kept verbatim apart from whitespace collapsing. Tables without
/// a single row are skipped.
#[instrument(level = "debug", skip(html), fields(bytes = html.len()))]
pub fn html_tables(html: &str) -> Result<Vec<RawCandidate>, ScrapeError> {
    let doc = Html::parse_document(html);
    let table_sel = Selector::parse("table").expect("static selector");
    let tr_sel = Selector::parse("tr").expect("static selector");

    let tables: Vec<RawCandidate> = doc
        .select(&table_sel)
        .enumerate()
        .filter_map(|(i, t)| parse_table(t, &tr_sel, i))
        .collect();

    for t in &tables {
        debug!(
            label = %t.label,
            rows = t.rows.len(),
            cols = t.width(),
            "extracted table"
        );
    }

    if tables.is_empty() {
        return Err(ScrapeError::NoCandidatesFound { kind: "HTML tables" });
    }
    Ok(tables)
}

fn walk_json(value: &Value, path: String, depth: usize, out: &mut Vec<JsonCandidate>) {
    if depth > MAX_JSON_DEPTH {
        return;
    }
    if let Some(payload) = JsonPayload::from_value(value) {
        out.push(JsonCandidate {
            label: path.clone(),
            payload,
        });
    }
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if v.is_array() || v.is_object() {
                    walk_json(v, format!("{}.{}", path, k), depth + 1, out);
                }
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                if v.is_array() || v.is_object() {
                    walk_json(v, format!("{}[{}]", path, i), depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

/// Every table-shaped array or object in `value`, root first, labelled by
/// JSON path.
#[instrument(level = "debug", skip(value))]
pub fn json_candidates(value: &Value) -> Result<Vec<JsonCandidate>, ScrapeError> {
    let mut out = Vec::new();
    walk_json(value, "$".to_string(), 0, &mut out);

    for c in &out {
        debug!(label = %c.label, records = c.payload.len(), "extracted JSON candidate");
    }

    if out.is_empty() {
        return Err(ScrapeError::NoCandidatesFound {
            kind: "JSON arrays or records",
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = r#"
<html><body>
  <table id="legend"><tr><td>Добар</td><td>0-50</td></tr></table>
  <table class="data">
    <thead><tr><th>Станица</th><th>Вријеме</th><th>O<sub>3</sub></th><th>PM10</th></tr></thead>
    <tbody>
      <tr><td>Бања Лука</td><td>14.12.2024 10:00</td><td>21</td><td>48</td></tr>
      <tr><td> Приједор </td><td>14.12.2024 10:00</td><td></td><td>77</td></tr>
    </tbody>
  </table>
</body></html>"#;

    #[test]
    fn parses_every_table_with_headers() {
        let tables = html_tables(PAGE).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].label, "table[0]");
        assert!(tables[0].headers.is_empty());
        assert_eq!(tables[0].rows, vec![vec!["Добар", "0-50"]]);

        let data = &tables[1];
        assert_eq!(data.headers, vec!["Станица", "Вријеме", "O3", "PM10"]);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[1][0], "Приједор");
        assert_eq!(data.rows[1][2], "");
    }

    #[test]
    fn nested_tables_stay_separate() {
        let html = r#"<table><tr><td>outer<table><tr><td>inner</td></tr></table></td><td>x</td></tr></table>"#;
        let tables = html_tables(html).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows, vec![vec!["outer", "x"]]);
        assert_eq!(tables[1].rows, vec![vec!["inner"]]);
    }

    #[test]
    fn colspan_and_irregular_rows() {
        let html = r#"<table>
            <tr><th colspan="2">Станица</th><th>PM10</th></tr>
            <tr><td>A</td><td>B</td><td>1</td></tr>
            <tr><td>short</td></tr>
        </table>"#;
        let t = &html_tables(html).unwrap()[0];
        assert_eq!(t.headers, vec!["Станица", "Станица", "PM10"]);
        assert_eq!(t.rows[1], vec!["short"]);
        assert_eq!(t.width(), 3);
    }

    #[test]
    fn td_label_row_becomes_header() {
        let html = r#"<table>
            <tr><td>Станица</td><td>Вријеме</td><td>SO2</td><td>PM10</td></tr>
            <tr><td>Бања Лука</td><td>10:00</td><td>5</td><td>48</td></tr>
        </table>"#;
        let t = &html_tables(html).unwrap()[0];
        assert_eq!(t.headers, vec!["Станица", "Вријеме", "SO2", "PM10"]);
        assert_eq!(t.rows, vec![vec!["Бања Лука", "10:00", "5", "48"]]);
    }

    #[test]
    fn rowspan_header_groups_merge_per_column() {
        let html = r#"<table>
            <thead>
              <tr><th colspan="4">Тренутни подаци</th></tr>
              <tr><th rowspan="2">Станица</th><th rowspan="2">Вријеме</th><th colspan="2">Концентрација (µg/m³)</th></tr>
              <tr><th>SO2</th><th>PM10</th></tr>
            </thead>
            <tbody>
              <tr><td>Бања Лука</td><td>10:00</td><td>5</td><td>48</td></tr>
            </tbody>
        </table>"#;
        let t = &html_tables(html).unwrap()[0];
        assert_eq!(
            t.headers,
            vec![
                "Станица",
                "Вријеме",
                "Концентрација (µg/m³) SO2",
                "Концентрација (µg/m³) PM10"
            ]
        );
        assert_eq!(t.rows, vec![vec!["Бања Лука", "10:00", "5", "48"]]);
    }

    #[test]
    fn body_rowspan_fills_later_rows() {
        let html = r#"<table>
            <tr><th>Станица</th><th>Вријеме</th><th>PM10</th></tr>
            <tr><td rowspan="2">Добој</td><td>10:00</td><td>62</td></tr>
            <tr><td>11:00</td><td>58</td></tr>
            <tr><td>Приједор</td><td>10:00</td><td>77</td></tr>
        </table>"#;
        let t = &html_tables(html).unwrap()[0];
        assert_eq!(
            t.rows,
            vec![
                vec!["Добој", "10:00", "62"],
                vec!["Добој", "11:00", "58"],
                vec!["Приједор", "10:00", "77"],
            ]
        );
    }

    #[test]
    fn page_without_tables_has_no_candidates() {
        let err = html_tables("<html><body><p>PM10 offline</p></body></html>").unwrap_err();
        assert!(matches!(err, ScrapeError::NoCandidatesFound { .. }));
    }

    #[test]
    fn json_candidates_walk_nested_values() {
        let v = json!({
            "meta": {"updated": "2024-12-14"},
            "data": [{"stanica": "S1", "O3": 1}],
            "legend": [1, 2, 3]
        });
        let found = json_candidates(&v).unwrap();
        let labels: Vec<_> = found.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["$.data"]);
    }

    #[test]
    fn json_scalar_has_no_candidates() {
        assert!(matches!(
            json_candidates(&json!("nothing")),
            Err(ScrapeError::NoCandidatesFound { .. })
        ));
    }
}
