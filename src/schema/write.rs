// src/schema/write.rs
use anyhow::{Context, Result};
use csv::{Terminator, WriterBuilder};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

use super::types::CanonicalTable;

/// UTF-8 byte-order mark, so spreadsheet tools pick up Cyrillic correctly.
pub const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialize `table` as BOM-prefixed delimited text into `w`.
pub fn write_csv<W: Write>(mut w: W, table: &CanonicalTable, delimiter: u8) -> Result<()> {
    w.write_all(BOM)?;
    let mut wtr = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(w);
    wtr.write_record(CanonicalTable::header())?;
    for row in &table.rows {
        wtr.write_record(row.cells())?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_bytes(table: &CanonicalTable, delimiter: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(&mut buf, table, delimiter)?;
    Ok(buf)
}

/// Write `table` to `path` atomically: temp sibling first, then rename over
/// the target. Returns the number of bytes written.
pub fn write_table<P: AsRef<Path>>(path: P, table: &CanonicalTable, delimiter: u8) -> Result<u64> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;
    }

    let bytes = to_bytes(table, delimiter)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output.csv".into());
    let tmp_path: PathBuf = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp_path, &bytes).with_context(|| format!("writing {:?}", tmp_path))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {:?} -> {:?}", tmp_path, path))?;

    info!(path = %path.display(), rows = table.len(), bytes = bytes.len(), "wrote table");
    Ok(bytes.len() as u64)
}
