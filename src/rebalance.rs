//! Deviation and trade computation.
//!
//! Every holding is priced, valued and compared to its target weight. The
//! result is a new [`RebalancedHolding`] per input row, in input order.
//!
//! A portfolio worth nothing has no meaningful weights: every `actual_pct`
//! is reported as zero, no trades are suggested, and deviations fall back to
//! `-target_pct` so the flag rule still applies.

use serde::Serialize;
use tracing::{debug, warn};

use crate::{Dollar, Percent, Result, portfolio::Holding, price::PriceSource};

pub const DEFAULT_THRESHOLD: Percent = 0.05;

/// Absorbs float noise so a deviation equal to the threshold stays unflagged.
const THRESHOLD_TOLERANCE: Percent = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalancedHolding {
    pub ticker: String,
    pub shares: f64,
    pub price: Dollar,
    pub value: Dollar,
    pub actual_pct: Percent,
    pub target_pct: Percent,
    pub deviation: Percent,
    pub rebalance_flag: bool,
    pub target_value: Dollar,
    pub rebalance_amount: Dollar,
    pub shares_to_trade: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rebalance {
    pub holdings: Vec<RebalancedHolding>,
    pub total_value: Dollar,
    pub threshold: Percent,
}

impl Rebalance {
    pub fn flagged(&self) -> impl Iterator<Item = &RebalancedHolding> {
        self.holdings.iter().filter(|h| h.rebalance_flag)
    }

    pub fn needs_rebalance(&self) -> bool {
        self.flagged().next().is_some()
    }
}

/// `|deviation| > threshold`, exclusive.
pub fn exceeds_threshold(deviation: Percent, threshold: Percent) -> bool {
    deviation.abs() - threshold > THRESHOLD_TOLERANCE
}

/// Rounds half to even: `2.5 -> 2`, `3.5 -> 4`, `-2.5 -> -2`.
pub fn round_shares(units: f64) -> i64 {
    units.round_ties_even() as i64
}

/// Prices every holding, one lookup at a time, and computes the rebalance.
///
/// The first failed lookup aborts the whole computation.
pub fn calculate_rebalance(
    holdings: &[Holding],
    prices: &dyn PriceSource,
    threshold: Percent,
) -> Result<Rebalance> {
    let mut priced = Vec::with_capacity(holdings.len());
    for holding in holdings {
        let price = prices.fetch_price(&holding.ticker)?;
        debug!(ticker = %holding.ticker, %price, "priced holding");
        priced.push((holding, price));
    }
    Ok(compute(&priced, threshold))
}

fn compute(priced: &[(&Holding, Dollar)], threshold: Percent) -> Rebalance {
    let total_value: Dollar = priced
        .iter()
        .map(|(holding, price)| *price * holding.shares)
        .sum();
    if total_value == Dollar::ZERO {
        warn!("Portfolio total value is zero, reporting 0% actual allocations");
    }

    let holdings = priced
        .iter()
        .map(|&(holding, price)| {
            let value = price * holding.shares;
            let actual_pct = value.share_of(total_value).unwrap_or(0.0);
            let deviation = actual_pct - holding.target_pct;
            let target_value = total_value * holding.target_pct;
            let rebalance_amount = target_value - value;
            let shares_to_trade = rebalance_amount
                .units_at(price)
                .map(round_shares)
                .unwrap_or(0);
            RebalancedHolding {
                ticker: holding.ticker.clone(),
                shares: holding.shares,
                price,
                value,
                actual_pct,
                target_pct: holding.target_pct,
                deviation,
                rebalance_flag: exceeds_threshold(deviation, threshold),
                target_value,
                rebalance_amount,
                shares_to_trade,
            }
        })
        .collect();

    Rebalance {
        holdings,
        total_value,
        threshold,
    }
}
