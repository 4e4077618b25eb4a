//! Run configuration for the metadata scrape and the history load.
//!
//! Defaults match the scheduled job: batches of five with a ten second pause,
//! a ten second request timeout, and a 365 day history window for the top 20
//! assets quoted in USD.

use std::path::PathBuf;
use std::time::Duration;

use crate::ValidationError;

pub const DEFAULT_SCRAPE_BASE_URL: &str = "https://coinmarketcap.com";
pub const DEFAULT_MARKET_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_METADATA_CSV_PATH: &str = "crypto_metadata.csv";

/// Settings for the page scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub batch_pause: Duration,
    pub timeout_ms: u64,
    /// Stop fetching once this much time has passed since the run started.
    pub run_deadline: Option<Duration>,
    pub csv_path: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SCRAPE_BASE_URL.to_owned(),
            batch_size: 5,
            batch_pause: Duration::from_secs(10),
            timeout_ms: 10_000,
            run_deadline: None,
            csv_path: PathBuf::from(DEFAULT_METADATA_CSV_PATH),
        }
    }
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_base_url(&self.base_url)?;
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Settings for the market-data client and the history load.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketConfig {
    pub base_url: String,
    /// Sent as `x-cg-demo-api-key` when present.
    pub api_key: Option<String>,
    pub vs_currency: String,
    pub top_coins: usize,
    pub fetch_days: u32,
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub timeout_ms: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MARKET_BASE_URL.to_owned(),
            api_key: None,
            vs_currency: String::from("usd"),
            top_coins: 20,
            fetch_days: 365,
            batch_size: 5,
            batch_pause: Duration::from_secs(10),
            timeout_ms: 10_000,
        }
    }
}

impl MarketConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_base_url(&self.base_url)?;

        let currency_ok = !self.vs_currency.is_empty()
            && self
                .vs_currency
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit());
        if !currency_ok {
            return Err(ValidationError::InvalidCurrency {
                value: self.vs_currency.clone(),
            });
        }
        if self.top_coins == 0 {
            return Err(ValidationError::InvalidTopN);
        }
        if self.fetch_days == 0 {
            return Err(ValidationError::InvalidFetchDays);
        }
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

fn validate_base_url(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    let has_host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty());
    if has_host {
        Ok(())
    } else {
        Err(ValidationError::InvalidBaseUrl {
            value: value.to_owned(),
        })
    }
}
