//! One rebalancing run: `Load -> Compute -> Persist -> Notify -> Done`.
//!
//! Load and Compute failures stop the run before anything is written. The
//! report is written before the history; if the report cannot be written the
//! run stops there. A history failure still lets the alert go out, then fails
//! the run. A failed alert never fails the run, and neither does a failed
//! console write.

use std::{fmt, io::Write};

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::{
    Dollar, Result,
    config::Config,
    history::Snapshot,
    notify::{self, Notifier, NotifyOutcome},
    portfolio::Portfolio,
    price::PriceSource,
    rebalance::{self, Rebalance},
    report::{self, ReportWriter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Compute,
    Persist,
    Notify,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Compute => "compute",
            Stage::Persist => "persist",
            Stage::Notify => "notify",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub rebalance: Rebalance,
    pub history_rows: usize,
    pub notification: NotifyOutcome,
}

pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub prices: &'a dyn PriceSource,
    pub notifier: Option<&'a dyn Notifier>,
    pub date: NaiveDate,
}

/// Progress output. Console text is advisory, so a failed write is logged
/// once and later lines are dropped instead of failing the run.
struct Console<'w> {
    out: &'w mut dyn Write,
    broken: bool,
}

impl<'w> Console<'w> {
    fn new(out: &'w mut dyn Write) -> Self {
        Self { out, broken: false }
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if self.broken {
            return;
        }
        if let Err(e) = self.out.write_fmt(args).and_then(|()| self.out.write_all(b"\n")) {
            warn!(error = %e, "console output failed, continuing without it");
            self.broken = true;
        }
    }
}

impl Pipeline<'_> {
    /// Runs every stage in order, writing progress to `out`.
    pub fn run(&self, out: &mut dyn Write) -> Result<RunSummary> {
        let mut console = Console::new(out);
        console.line(format_args!("Portfolio Rebalancing - {}", self.date));

        info!(stage = %Stage::Load, portfolio = %self.config.portfolio_file.display());
        let portfolio = Portfolio::load_from_file(&self.config.portfolio_file)?;

        info!(stage = %Stage::Compute, holdings = portfolio.holdings.len());
        let rebalance =
            rebalance::calculate_rebalance(&portfolio.holdings, self.prices, self.config.threshold)?;
        console.line(format_args!(
            "\nRebalance Check ({:.0}% Threshold Rule):\n",
            self.config.threshold * 100.0
        ));
        console.line(format_args!("{}", report::render_table(&rebalance)));
        console.line(format_args!("Total value: {}", rebalance.total_value));
        if rebalance.total_value == Dollar::ZERO {
            console.line(format_args!(
                "Warning: total portfolio value is zero, allocations shown as 0%"
            ));
        }

        info!(stage = %Stage::Persist);
        let writer = ReportWriter::from_config(self.config);
        writer.write_report(&rebalance)?;
        console.line(format_args!("Report saved to {}", writer.report_path().display()));
        let snapshot = Snapshot::from_rebalance(&rebalance, self.date);
        let history = writer.append_history(&snapshot);
        match &history {
            Ok(history) => console.line(format_args!(
                "History updated in {} ({} rows), chart saved to {}",
                writer.history_path().display(),
                history.rows.len(),
                writer.chart_path().display()
            )),
            Err(e) => {
                error!(error = %e, "history update failed");
                console.line(format_args!("History not updated: {e}"));
            }
        }

        info!(stage = %Stage::Notify);
        let notification = notify::check_and_notify(&rebalance, self.notifier);
        match &notification {
            NotifyOutcome::Sent => console.line(format_args!("Rebalance alert sent.")),
            NotifyOutcome::Failed(e) => {
                console.line(format_args!("Rebalance alert not sent: {e}"))
            }
            NotifyOutcome::Disabled | NotifyOutcome::NothingFlagged => {}
        }

        let history_rows = history?.rows.len();
        info!(stage = %Stage::Done, needs_rebalance = rebalance.needs_rebalance());
        Ok(RunSummary {
            rebalance,
            history_rows,
            notification,
        })
    }
}
