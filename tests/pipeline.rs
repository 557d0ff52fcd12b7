//! End-to-end runs of the rebalancing pipeline against temp directories.

use std::{
    cell::Cell,
    fs,
    io::{self, Write},
    path::Path,
};

use chrono::NaiveDate;
use portfolio_rebalancer::{
    Dollar, Error, Result,
    config::Config,
    notify::{Notifier, NotifyOutcome},
    price::PriceTable,
    run::{Pipeline, RunSummary},
};

#[derive(Default)]
struct CountingNotifier {
    calls: Cell<usize>,
    fail: bool,
}

impl Notifier for CountingNotifier {
    fn notify(&self, _subject: &str, body: &str) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        assert!(body.contains("AAPL"));
        if self.fail {
            Err(Error::Notification("smtp down".into()))
        } else {
            Ok(())
        }
    }
}

fn config_in(dir: &Path, portfolio: &str) -> Config {
    let portfolio_file = dir.join("portfolio.csv");
    fs::write(&portfolio_file, portfolio).unwrap();
    Config {
        portfolio_file,
        report_file: dir.join("out").join("report.csv"),
        history_file: dir.join("out").join("history.csv"),
        chart_file: dir.join("out").join("history.svg"),
        ..Config::default()
    }
}

const EXAMPLE_PORTFOLIO: &str = "ticker,shares,target_pct\nAAPL,10,0.6\nGOOG,5,0.4\n";

fn example_prices() -> PriceTable {
    PriceTable::new().with("AAPL", 150.0).with("GOOG", 100.0)
}

fn date(d: &str) -> NaiveDate {
    d.parse().unwrap()
}

fn run(
    config: &Config,
    prices: &PriceTable,
    notifier: Option<&dyn Notifier>,
    on: &str,
) -> (Result<RunSummary>, String) {
    let pipeline = Pipeline {
        config,
        prices,
        notifier,
        date: date(on),
    };
    let mut out = Vec::new();
    let result = pipeline.run(&mut out);
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn full_run_writes_everything_and_alerts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), EXAMPLE_PORTFOLIO);
    let notifier = CountingNotifier::default();

    let (result, out) = run(&config, &example_prices(), Some(&notifier), "2024-06-03");
    let summary = result.unwrap();

    assert_eq!(summary.rebalance.total_value, Dollar(2000.0));
    assert_eq!(summary.history_rows, 2);
    assert!(matches!(summary.notification, NotifyOutcome::Sent));
    assert_eq!(notifier.calls.get(), 1);

    assert!(out.starts_with("Portfolio Rebalancing - 2024-06-03"));
    assert!(out.contains("Total value: $2000.00"));
    assert!(out.contains("Rebalance alert sent."));

    assert!(config.report_file.exists());
    assert!(config.chart_file.exists());
    let history = fs::read_to_string(&config.history_file).unwrap();
    assert_eq!(history.lines().count(), 3);
}

#[test]
fn history_accumulates_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), EXAMPLE_PORTFOLIO);

    let (first, _) = run(&config, &example_prices(), None, "2024-06-03");
    first.unwrap();
    let after_first = fs::read_to_string(&config.history_file).unwrap();

    let prices = PriceTable::new().with("AAPL", 160.0).with("GOOG", 90.0);
    let (second, _) = run(&config, &prices, None, "2024-06-04");
    assert_eq!(second.unwrap().history_rows, 4);

    let after_second = fs::read_to_string(&config.history_file).unwrap();
    assert!(after_second.starts_with(&after_first));
    let new_rows: Vec<&str> = after_second.lines().skip(3).collect();
    assert_eq!(
        new_rows,
        [
            "AAPL,160.0,1600.0,2024-06-04,2050.0",
            "GOOG,90.0,450.0,2024-06-04,2050.0"
        ]
    );

    let svg = fs::read_to_string(&config.chart_file).unwrap();
    assert_eq!(svg.matches("<polyline").count(), 1);
    assert_eq!(svg.matches("<circle").count(), 2);
}

#[test]
fn rerun_with_same_data_rewrites_same_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), EXAMPLE_PORTFOLIO);

    run(&config, &example_prices(), None, "2024-06-03").0.unwrap();
    let report = fs::read(&config.report_file).unwrap();
    run(&config, &example_prices(), None, "2024-06-03").0.unwrap();
    assert_eq!(report, fs::read(&config.report_file).unwrap());
}

#[test]
fn missing_price_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), EXAMPLE_PORTFOLIO);
    let notifier = CountingNotifier::default();
    let prices = PriceTable::new().with("AAPL", 150.0);

    let (result, _) = run(&config, &prices, Some(&notifier), "2024-06-03");
    assert!(matches!(
        result,
        Err(Error::PriceUnavailable { ref ticker, .. }) if ticker == "GOOG"
    ));
    assert!(!config.report_file.exists());
    assert!(!config.history_file.exists());
    assert_eq!(notifier.calls.get(), 0);
}

#[test]
fn missing_portfolio_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), EXAMPLE_PORTFOLIO);
    config.portfolio_file = dir.path().join("missing.csv");

    let (result, _) = run(&config, &example_prices(), None, "2024-06-03");
    assert!(matches!(result, Err(Error::ConfigRead { .. })));
}

#[test]
fn corrupt_history_still_alerts_then_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), EXAMPLE_PORTFOLIO);
    fs::create_dir_all(config.history_file.parent().unwrap()).unwrap();
    let corrupt = "when,worth\nyesterday,lots\n";
    fs::write(&config.history_file, corrupt).unwrap();
    let notifier = CountingNotifier::default();

    let (result, out) = run(&config, &example_prices(), Some(&notifier), "2024-06-03");
    assert!(matches!(result, Err(Error::HistoryCorrupt { .. })));
    assert!(out.contains("History not updated"));
    assert!(config.report_file.exists());
    assert_eq!(notifier.calls.get(), 1);
    assert_eq!(fs::read_to_string(&config.history_file).unwrap(), corrupt);
}

#[test]
fn unwritable_report_stops_before_alert() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), EXAMPLE_PORTFOLIO);
    // a directory where the report file should go
    config.report_file = dir.path().to_path_buf();
    let notifier = CountingNotifier::default();

    let (result, _) = run(&config, &example_prices(), Some(&notifier), "2024-06-03");
    assert!(matches!(result, Err(Error::Persist { .. })));
    assert_eq!(notifier.calls.get(), 0);
    assert!(!config.history_file.exists());
}

#[test]
fn failed_alert_does_not_fail_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), EXAMPLE_PORTFOLIO);
    let notifier = CountingNotifier {
        fail: true,
        ..Default::default()
    };

    let (result, out) = run(&config, &example_prices(), Some(&notifier), "2024-06-03");
    let summary = result.unwrap();
    assert!(matches!(
        summary.notification,
        NotifyOutcome::Failed(Error::Notification(_))
    ));
    assert!(out.contains("Rebalance alert not sent"));
    assert_eq!(summary.history_rows, 2);
}

#[test]
fn zero_value_portfolio_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        "ticker,shares,target_pct\nAAPL,0,0.6\nGOOG,0,0.4\n",
    );

    let (result, out) = run(&config, &example_prices(), None, "2024-06-03");
    let summary = result.unwrap();
    assert_eq!(summary.rebalance.total_value, Dollar::ZERO);
    assert!(
        summary
            .rebalance
            .holdings
            .iter()
            .all(|h| h.actual_pct == 0.0 && h.shares_to_trade == 0)
    );
    assert!(out.contains("total portfolio value is zero"));
}

#[test]
fn threshold_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), EXAMPLE_PORTFOLIO);
    config.threshold = 0.2;
    let notifier = CountingNotifier::default();

    let (result, out) = run(&config, &example_prices(), Some(&notifier), "2024-06-03");
    assert!(matches!(
        result.unwrap().notification,
        NotifyOutcome::NothingFlagged
    ));
    assert!(out.contains("20% Threshold Rule"));
    assert_eq!(notifier.calls.get(), 0);
}

struct HangUp;

impl Write for HangUp {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn closed_stdout_still_persists_and_alerts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), EXAMPLE_PORTFOLIO);
    let notifier = CountingNotifier::default();
    let prices = example_prices();
    let pipeline = Pipeline {
        config: &config,
        prices: &prices,
        notifier: Some(&notifier),
        date: date("2024-06-03"),
    };

    let summary = pipeline.run(&mut HangUp).unwrap();
    assert_eq!(summary.history_rows, 2);
    assert!(config.report_file.exists());
    assert!(config.history_file.exists());
    assert!(config.chart_file.exists());
    assert_eq!(notifier.calls.get(), 1);
}
