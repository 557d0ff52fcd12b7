use std::fmt;

use derive_more::{Add, AddAssign, Mul, Sub, Sum};
use serde::{Deserialize, Serialize};

pub mod chart;
pub mod config;
pub mod error;
pub mod history;
pub mod notify;
pub mod portfolio;
pub mod price;
pub mod rebalance;
pub mod report;
pub mod run;

pub use error::{Error, Result};

/// Portfolio weight expressed as a fraction, `0.05` is five percent.
pub type Percent = f64;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    PartialOrd,
    Add,
    AddAssign,
    Sub,
    Mul,
    Sum,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Dollar(pub f64);

impl Dollar {
    pub const ZERO: Dollar = Dollar(0.0);

    /// Fraction of `total` this amount represents, `None` when `total` is zero.
    pub fn share_of(self, total: Dollar) -> Option<Percent> {
        (total.0 != 0.0).then(|| self.0 / total.0)
    }

    /// Number of units of `price` this amount buys, `None` for a zero price.
    pub fn units_at(self, price: Dollar) -> Option<f64> {
        (price.0 != 0.0).then(|| self.0 / price.0)
    }
}

impl fmt::Display for Dollar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0.0 {
            write!(f, "-${:.2}", self.0.abs())
        } else {
            write!(f, "${:.2}", self.0)
        }
    }
}
