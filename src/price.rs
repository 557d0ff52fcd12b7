//! Market price lookups.
//!
//! The rebalance engine only sees [`PriceSource`]. Live runs scrape the
//! Yahoo Finance quote page; offline runs and tests use a fixed
//! [`PriceTable`].

use std::{collections::HashMap, fs::File, path::Path, time::Duration};

use reqwest::blocking::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;

use crate::{Dollar, Error, Result};

pub trait PriceSource {
    /// Current market price of `ticker`, or [`Error::PriceUnavailable`].
    fn fetch_price(&self, ticker: &str) -> Result<Dollar>;
}

const QUOTE_PAGE_URL: &str = "https://finance.yahoo.com/quote";
const USER_AGENT: &str = "Mozilla/5.0";
const PRICE_SELECTOR: &str = r#"fin-streamer[data-field="regularMarketPrice"]"#;

/// Scrapes the regular market price off the Yahoo Finance quote page.
pub struct YahooQuotePage {
    client: Client,
    base_url: String,
}

impl YahooQuotePage {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: QUOTE_PAGE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl PriceSource for YahooQuotePage {
    fn fetch_price(&self, ticker: &str) -> Result<Dollar> {
        let url = format!("{}/{ticker}", self.base_url.trim_end_matches('/'));
        debug!(%url, "fetching quote page");
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::price_unavailable(ticker, format!("request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::price_unavailable(
                ticker,
                format!("quote page returned {}", resp.status()),
            ));
        }
        let body = resp
            .text()
            .map_err(|e| Error::price_unavailable(ticker, format!("unreadable body: {e}")))?;
        parse_quote_page(&body, ticker)
    }
}

/// Extracts the regular market price for `ticker` from a quote page.
///
/// Quote pages carry several price streamers (indices in the header, related
/// tickers), so the one tagged with the requested symbol wins and the first
/// streamer on the page is the fallback.
pub fn parse_quote_page(html: &str, ticker: &str) -> Result<Dollar> {
    let selector = Selector::parse(PRICE_SELECTOR)
        .map_err(|e| Error::price_unavailable(ticker, format!("bad selector: {e}")))?;
    let document = Html::parse_document(html);
    let mut candidates = document.select(&selector).peekable();
    let first = candidates
        .peek()
        .copied()
        .ok_or_else(|| Error::price_unavailable(ticker, "no market price on quote page"))?;
    let element = candidates
        .find(|el| {
            el.value()
                .attr("data-symbol")
                .is_some_and(|sym| sym.eq_ignore_ascii_case(ticker))
        })
        .unwrap_or(first);
    let text: String = element.text().collect();
    parse_price_text(ticker, &text)
}

fn parse_price_text(ticker: &str, text: &str) -> Result<Dollar> {
    let cleaned = text.trim().replace(',', "");
    let price: f64 = cleaned
        .parse()
        .map_err(|_| Error::price_unavailable(ticker, format!("unparsable price {text:?}")))?;
    if !price.is_finite() || price < 0.0 {
        return Err(Error::price_unavailable(
            ticker,
            format!("invalid price {price}"),
        ));
    }
    Ok(Dollar(price))
}

/// Fixed ticker to price map. Lookups ignore ticker case.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<String, Dollar>,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    ticker: String,
    price: f64,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ticker: &str, price: f64) -> Self {
        self.insert(ticker, price);
        self
    }

    pub fn insert(&mut self, ticker: &str, price: f64) {
        self.prices
            .insert(ticker.trim().to_ascii_uppercase(), Dollar(price));
    }

    /// Loads a `ticker,price` CSV.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);
        let mut table = Self::new();
        for row in csv_reader.deserialize::<PriceRow>() {
            let row = row.map_err(|e| {
                Error::Config(format!("price file {}: malformed row: {e}", path.display()))
            })?;
            if !row.price.is_finite() || row.price < 0.0 {
                return Err(Error::Config(format!(
                    "price file {}: invalid price {} for {}",
                    path.display(),
                    row.price,
                    row.ticker
                )));
            }
            table.insert(&row.ticker, row.price);
        }
        Ok(table)
    }
}

impl PriceSource for PriceTable {
    fn fetch_price(&self, ticker: &str) -> Result<Dollar> {
        self.prices
            .get(&ticker.trim().to_ascii_uppercase())
            .copied()
            .ok_or_else(|| Error::price_unavailable(ticker, "unknown ticker"))
    }
}
