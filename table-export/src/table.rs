use crate::columns::ColumnPolicy;
use chrono::{DateTime, Local};
use harvest_core::{CanonicalRecord, ExportError};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Records plus the column layout they are serialized with.
#[derive(Debug)]
pub struct RecordTable<'a> {
    columns: Vec<&'static str>,
    positions: HashMap<&'static str, usize>,
    records: &'a [CanonicalRecord],
}

impl<'a> RecordTable<'a> {
    /// Lays out `records` under the columns `policy` infers. An empty record
    /// sequence is refused rather than written as a header-only file.
    pub fn build(records: &'a [CanonicalRecord], policy: ColumnPolicy) -> Result<Self, ExportError> {
        if records.is_empty() {
            return Err(ExportError::Empty);
        }
        let columns = policy.infer(records);
        let positions = columns
            .iter()
            .enumerate()
            .map(|(index, name)| (*name, index))
            .collect();
        debug!(
            "Inferred {} columns from {:?} over {} records",
            columns.len(),
            policy,
            records.len()
        );
        Ok(Self {
            columns,
            positions,
            records,
        })
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One cell per column for `record`; absent fields are empty.
    fn row(&self, record: &'a CanonicalRecord) -> (Vec<Cow<'a, str>>, usize) {
        let mut row = vec![Cow::Borrowed(""); self.columns.len()];
        let mut dropped = 0;
        for (name, value) in record.fields() {
            match self.positions.get(name) {
                Some(&index) => row[index] = value.render(),
                None => dropped += 1,
            }
        }
        (row, dropped)
    }

    /// Rows in record order, without the header.
    pub fn rows(&self) -> impl Iterator<Item = Vec<Cow<'a, str>>> + '_ {
        self.records.iter().map(|record| self.row(record).0)
    }

    /// Writes the header and every row as CSV.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;

        let mut dropped = 0;
        for record in self.records {
            let (row, lost) = self.row(record);
            dropped += lost;
            csv_writer.write_record(row.iter().map(|cell| cell.as_bytes()))?;
        }
        csv_writer.flush()?;

        if dropped > 0 {
            warn!(
                "{} values had no column in the inferred set and were left out",
                dropped
            );
        }
        Ok(())
    }

    /// Writes the table to `path`, creating missing parent directories.
    pub fn write_csv(&self, path: &Path) -> Result<(), ExportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        self.write_to(file)?;
        info!(
            "Wrote {} records in {} columns to {}",
            self.records.len(),
            self.columns.len(),
            path.display()
        );
        Ok(())
    }
}

/// Builds the table and writes it in one go; returns the number of rows.
pub fn export_csv(
    records: &[CanonicalRecord],
    path: &Path,
    policy: ColumnPolicy,
) -> Result<usize, ExportError> {
    let table = RecordTable::build(records, policy)?;
    table.write_csv(path)?;
    Ok(table.len())
}

/// `{dir}/comments-{timestamp}.csv`, timestamped to the second.
pub fn default_output_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("comments-{}.csv", now.format("%Y-%m-%d_%H-%M-%S")))
}
