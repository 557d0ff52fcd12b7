use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};
use tracing::info;

use crate::{
    Dollar, Error, Percent, Result, chart,
    config::Config,
    history::{self, History, Snapshot},
    rebalance::{Rebalance, RebalancedHolding},
};

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    ticker: &'a str,
    shares: f64,
    price: Dollar,
    value: Dollar,
    actual_pct: Percent,
    target_pct: Percent,
    deviation: Percent,
    rebalance_flag: bool,
    shares_to_trade: i64,
}

impl<'a> From<&'a RebalancedHolding> for ReportRow<'a> {
    fn from(h: &'a RebalancedHolding) -> Self {
        Self {
            ticker: &h.ticker,
            shares: h.shares,
            price: h.price,
            value: h.value,
            actual_pct: h.actual_pct,
            target_pct: h.target_pct,
            deviation: h.deviation,
            rebalance_flag: h.rebalance_flag,
            shares_to_trade: h.shares_to_trade,
        }
    }
}

/// Writes the current report, the history log and its trend chart.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    report: PathBuf,
    history: PathBuf,
    chart: PathBuf,
}

impl ReportWriter {
    pub fn new(
        report: impl Into<PathBuf>,
        history: impl Into<PathBuf>,
        chart: impl Into<PathBuf>,
    ) -> Self {
        Self {
            report: report.into(),
            history: history.into(),
            chart: chart.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.report_file, &config.history_file, &config.chart_file)
    }

    pub fn report_path(&self) -> &Path {
        &self.report
    }

    pub fn history_path(&self) -> &Path {
        &self.history
    }

    pub fn chart_path(&self) -> &Path {
        &self.chart
    }

    /// Overwrites the report with the full rebalance table.
    pub fn write_report(&self, rebalance: &Rebalance) -> Result<()> {
        let path = &self.report;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::persist(path, e))?;
        }
        let write = || -> std::result::Result<(), csv::Error> {
            let mut writer = csv::Writer::from_path(path)?;
            for holding in &rebalance.holdings {
                writer.serialize(ReportRow::from(holding))?;
            }
            writer.flush()?;
            Ok(())
        };
        write().map_err(|e| Error::persist(path, e))?;
        info!(path = %path.display(), rows = rebalance.holdings.len(), "wrote report");
        Ok(())
    }

    /// Appends `snapshot` to the history and redraws the trend chart.
    pub fn append_history(&self, snapshot: &Snapshot) -> Result<History> {
        let history = history::append_history(&self.history, snapshot)?;
        chart::write_trend_chart(&self.chart, &history.trend())?;
        info!(
            history = %self.history.display(),
            chart = %self.chart.display(),
            rows = history.rows.len(),
            "updated history"
        );
        Ok(history)
    }
}

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Shares")]
    shares: String,
    #[tabled(rename = "Price")]
    price: Dollar,
    #[tabled(rename = "Value")]
    value: Dollar,
    #[tabled(rename = "Actual")]
    actual_pct: String,
    #[tabled(rename = "Target")]
    target_pct: String,
    #[tabled(rename = "Deviation")]
    deviation: String,
    #[tabled(rename = "Rebalance")]
    rebalance_flag: String,
    #[tabled(rename = "Trade")]
    shares_to_trade: i64,
}

fn percent(p: Percent) -> String {
    format!("{:.2}%", p * 100.0)
}

/// Console rendering of the rebalance table.
pub fn render_table(rebalance: &Rebalance) -> String {
    let rows = rebalance.holdings.iter().map(|h| TableRow {
        ticker: h.ticker.clone(),
        shares: format!("{}", h.shares),
        price: h.price,
        value: h.value,
        actual_pct: percent(h.actual_pct),
        target_pct: percent(h.target_pct),
        deviation: format!("{:+.2}%", h.deviation * 100.0),
        rebalance_flag: if h.rebalance_flag { "yes" } else { "no" }.to_string(),
        shares_to_trade: h.shares_to_trade,
    });
    Table::new(rows).with(Style::modern()).to_string()
}
