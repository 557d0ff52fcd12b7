use std::path::PathBuf;

use clap::Parser;
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(name = "rebalance", version, about = "Check a portfolio against its target allocation")]
pub(crate) struct Cli {
    #[arg(short, long, help = "Configuration file (YAML or JSON)")]
    pub config: Option<PathBuf>,
    #[arg(short, long, help = "Portfolio CSV with ticker, shares and target_pct columns")]
    pub portfolio: Option<PathBuf>,
    #[arg(long, help = "Where to write the rebalance report")]
    pub report: Option<PathBuf>,
    #[arg(long, help = "Append-only history CSV")]
    pub history: Option<PathBuf>,
    #[arg(long, help = "Where to write the history trend chart (SVG)")]
    pub chart: Option<PathBuf>,
    #[arg(short, long, help = "Deviation that triggers a rebalance, as a fraction (0.05 = 5%)")]
    pub threshold: Option<f64>,
    #[arg(long, help = "Read prices from a ticker,price CSV instead of the web")]
    pub prices: Option<PathBuf>,
    #[arg(long, help = "Do not send email alerts")]
    pub no_email: bool,
    #[arg(long, value_enum, help = "Print a shell completion script and exit")]
    pub completions: Option<Shell>,
}
