// src/history/archive.rs
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::schema::types::CanonicalTable;
use crate::schema::write::write_table;

/// Date-partitioned snapshots of emitted tables:
/// `<dir>/date=YYYY-MM-DD/air_quality_HHMMSS.csv`.
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating archive directory {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot path for a run finished at `at`.
    pub fn snapshot_path<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> PathBuf
    where
        Tz::Offset: std::fmt::Display,
    {
        self.dir
            .join(format!("date={}", at.format("%Y-%m-%d")))
            .join(format!("air_quality_{}.csv", at.format("%H%M%S")))
    }

    /// Write a copy of `table`. A snapshot from the same second is replaced.
    pub fn record<Tz: TimeZone>(
        &self,
        table: &CanonicalTable,
        delimiter: u8,
        at: &DateTime<Tz>,
    ) -> Result<PathBuf>
    where
        Tz::Offset: std::fmt::Display,
    {
        let path = self.snapshot_path(at);
        write_table(&path, table, delimiter)?;
        info!(path = %path.display(), "archived snapshot");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::CanonicalRow;
    use chrono::{FixedOffset, TimeZone};
    use tempfile::tempdir;

    #[test]
    fn snapshots_are_partitioned_by_date() -> Result<()> {
        let dir = tempdir()?;
        let archive = Archive::new(dir.path().join("archive"))?;
        let at = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 12, 14, 10, 5, 9)
            .unwrap();
        let table = CanonicalTable {
            rows: vec![CanonicalRow::new("Добој", "10:00")],
        };

        let path = archive.record(&table, b',', &at)?;
        assert_eq!(
            path,
            archive
                .dir()
                .join("date=2024-12-14")
                .join("air_quality_100509.csv")
        );
        assert!(path.is_file());
        Ok(())
    }
}
