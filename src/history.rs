//! Append-only CSV history of portfolio snapshots.
//!
//! Each run adds one block of rows, one per holding, all sharing the run date
//! and total value. Existing rows are validated and then written back
//! verbatim, never re-serialized.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, Read, Write},
    path::Path,
};

use chrono::NaiveDate;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{Dollar, Error, Result, rebalance::Rebalance};

pub const HISTORY_COLUMNS: [&str; 5] = ["ticker", "price", "value", "date", "total_value"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub ticker: String,
    pub price: Dollar,
    pub value: Dollar,
    pub date: NaiveDate,
    pub total_value: Dollar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub total_value: Dollar,
    pub rows: Vec<HistoryRow>,
}

impl Snapshot {
    pub fn from_rebalance(rebalance: &Rebalance, date: NaiveDate) -> Self {
        let rows = rebalance
            .holdings
            .iter()
            .map(|h| HistoryRow {
                ticker: h.ticker.clone(),
                price: h.price,
                value: h.value,
                date,
                total_value: rebalance.total_value,
            })
            .collect();
        Self {
            date,
            total_value: rebalance.total_value,
            rows,
        }
    }
}

/// History rows as stored, plus the raw records they were parsed from.
#[derive(Debug, Default)]
pub struct History {
    pub rows: Vec<HistoryRow>,
    records: Vec<StringRecord>,
}

impl History {
    /// Reads `path`; a missing or empty file is an empty history.
    pub fn load(path: &Path) -> Result<Self> {
        let mut contents = Vec::new();
        match File::open(path) {
            Ok(mut file) => {
                file.read_to_end(&mut contents)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        }
        if contents.is_empty() {
            return Ok(Self::default());
        }

        let mut csv_reader = csv::Reader::from_reader(contents.as_slice());
        let headers = csv_reader
            .headers()
            .map_err(|e| Error::history_corrupt(path, e))?
            .clone();
        if !headers.iter().eq(HISTORY_COLUMNS) {
            return Err(Error::history_corrupt(
                path,
                format!(
                    "expected columns {}, found {}",
                    HISTORY_COLUMNS.join(","),
                    headers.iter().collect::<Vec<_>>().join(",")
                ),
            ));
        }

        let mut history = Self::default();
        for record in csv_reader.records() {
            let record = record.map_err(|e| Error::history_corrupt(path, e))?;
            let row: HistoryRow = record
                .deserialize(Some(&headers))
                .map_err(|e| Error::history_corrupt(path, e))?;
            history.rows.push(row);
            history.records.push(record);
        }
        debug!(rows = history.rows.len(), path = %path.display(), "loaded history");
        Ok(history)
    }

    /// Snapshot totals keyed by date; the last run of a date wins.
    pub fn trend(&self) -> Vec<(NaiveDate, Dollar)> {
        self.rows
            .iter()
            .map(|row| (row.date, row.total_value))
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .collect()
    }
}

/// Appends `snapshot` to the history at `path` and returns the full history.
pub fn append_history(path: &Path, snapshot: &Snapshot) -> Result<History> {
    let mut history = History::load(path)?;
    replace_history(path, &history.records, &snapshot.rows)?;

    history.rows.extend(snapshot.rows.iter().cloned());
    debug!(
        added = snapshot.rows.len(),
        total = history.rows.len(),
        "appended snapshot"
    );
    Ok(history)
}

/// Rewrites `path` through a temp file in the same directory. A failed write
/// leaves the previous history in place and no temp file behind.
fn replace_history(path: &Path, existing: &[StringRecord], new_rows: &[HistoryRow]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|e| Error::persist(path, e))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::persist(path, e))?;
    write_history(tmp.as_file_mut(), existing, new_rows).map_err(|e| Error::persist(path, e))?;
    tmp.persist(path).map_err(|e| Error::persist(path, e.error))?;
    Ok(())
}

fn write_history(
    out: impl Write,
    existing: &[StringRecord],
    new_rows: &[HistoryRow],
) -> std::result::Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(HISTORY_COLUMNS)?;
    for record in existing {
        writer.write_record(record)?;
    }
    for row in new_rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
