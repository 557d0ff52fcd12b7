use std::{fs::File, io::Read, path::Path};

use csv::StringRecord;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{Error, Percent, Result};

pub const REQUIRED_COLUMNS: [&str; 3] = ["ticker", "shares", "target_pct"];

/// Targets summing further than this from 1.0 are reported but still used.
const TARGET_SUM_TOLERANCE: Percent = 0.01;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub shares: f64,
    pub target_pct: Percent,
}

impl Holding {
    pub fn new(ticker: impl Into<String>, shares: f64, target_pct: Percent) -> Self {
        Self {
            ticker: ticker.into(),
            shares,
            target_pct,
        }
    }

    fn validate(&self, line: u64) -> Result<()> {
        if self.ticker.is_empty() {
            return Err(Error::Config(format!("line {line}: empty ticker")));
        }
        if !self.shares.is_finite() || self.shares < 0.0 {
            return Err(Error::Config(format!(
                "line {line}: shares for {} must be a non-negative number, got {}",
                self.ticker, self.shares
            )));
        }
        if !(0.0..=1.0).contains(&self.target_pct) {
            return Err(Error::Config(format!(
                "line {line}: target_pct for {} must be within [0, 1], got {}",
                self.ticker, self.target_pct
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("portfolio {}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let headers = csv_reader
            .headers()
            .map_err(|e| Error::Config(format!("unreadable header: {e}")))?
            .clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .into_iter()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .collect();
        if !missing.is_empty() {
            warn!(?headers, "Unexpected portfolio headers");
            return Err(Error::Config(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }

        let mut holdings = Vec::new();
        let mut record = StringRecord::new();
        let mut consumed = csv_reader.position().byte();
        while csv_reader
            .read_record(&mut record)
            .map_err(|e| Error::Config(format!("malformed row: {e}")))?
        {
            let line = line_at(&text, consumed);
            consumed = csv_reader.position().byte();
            let holding: Holding = record
                .deserialize(Some(&headers))
                .map_err(|e| Error::Config(format!("line {line}: malformed row: {e}")))?;
            holding.validate(line)?;
            debug!(?holding, "parsed holding");
            holdings.push(holding);
        }
        if holdings.is_empty() {
            return Err(Error::Config("portfolio has no holdings".into()));
        }

        let portfolio = Self { holdings };
        let target_total = portfolio.target_total();
        if (target_total - 1.0).abs() > TARGET_SUM_TOLERANCE {
            warn!(target_total, "Target allocations do not add up to 100%");
        }
        Ok(portfolio)
    }

    pub fn target_total(&self) -> Percent {
        self.holdings.iter().map(|h| h.target_pct).sum()
    }
}

/// 1-based line of the first record at or after byte `offset`. The csv reader
/// skips blank lines between records, so they are skipped here too.
fn line_at(text: &str, offset: u64) -> u64 {
    let offset = usize::try_from(offset).map_or(text.len(), |o| o.min(text.len()));
    let rest = &text.as_bytes()[offset..];
    let blank = rest.iter().take_while(|&&b| b == b'\r' || b == b'\n').count();
    let newlines = text.as_bytes()[..offset + blank]
        .iter()
        .filter(|&&b| b == b'\n')
        .count();
    newlines as u64 + 1
}
