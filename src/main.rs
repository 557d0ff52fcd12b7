use std::io;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use directories::ProjectDirs;
use portfolio_rebalancer::{
    config::Config,
    notify::{Notifier, SmtpNotifier},
    price::{PriceSource, PriceTable, YahooQuotePage},
    run::Pipeline,
};

mod cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let opts = cli::Cli::parse();

    if let Some(shell) = opts.completions {
        clap_complete::generate(shell, &mut cli::Cli::command(), "rebalance", &mut io::stdout());
        return Ok(());
    }

    let Some(config_path) = opts.config.or(
        ProjectDirs::from("org", "quotidian", "portfolio-rebalancer")
            .map(|pdirs| pdirs.config_dir().join("config.yml")),
    ) else {
        anyhow::bail!("Failed to get config path");
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    if let Some(portfolio) = opts.portfolio {
        config.portfolio_file = portfolio;
    }
    if let Some(report) = opts.report {
        config.report_file = report;
    }
    if let Some(history) = opts.history {
        config.history_file = history;
    }
    if let Some(chart) = opts.chart {
        config.chart_file = chart;
    }
    if let Some(threshold) = opts.threshold {
        config.threshold = threshold;
    }
    if opts.no_email {
        config.email_enabled = false;
    }
    config.validate()?;

    let prices: Box<dyn PriceSource> = match opts.prices {
        Some(path) => Box::new(PriceTable::load_from_file(&path)?),
        None => Box::new(YahooQuotePage::new(config.price_timeout())?),
    };
    let notifier = config
        .email()?
        .map(|email| SmtpNotifier::new(email, config.smtp_timeout()));

    let pipeline = Pipeline {
        config: &config,
        prices: prices.as_ref(),
        notifier: notifier.as_ref().map(|n| n as &dyn Notifier),
        date: chrono::Local::now().date_naive(),
    };
    pipeline.run(&mut io::stdout().lock())?;
    Ok(())
}
