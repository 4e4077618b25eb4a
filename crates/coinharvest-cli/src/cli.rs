//! CLI argument definitions for coinharvest.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `metadata` | Scrape asset pages, rebuild `crypto_metadata`, export CSV |
//! | `history` | Load price history for the top-N assets |
//! | `prices` | Daily close prices stored for one asset |
//! | `runs` | Committed and rolled back units per ingest run |
//! | `assets` | Show the asset list a run would use |
//!
//! Every option backed by an environment variable can also be set in a
//! `.env` file in the working directory.
//!
//! # Examples
//!
//! ```bash
//! coinharvest metadata --batch-size 5 --sleep-seconds 10
//! coinharvest history --top 20 --days 365
//! coinharvest prices bitcoin --pretty
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use coinharvest_core::config::{
    DEFAULT_MARKET_BASE_URL, DEFAULT_METADATA_CSV_PATH, DEFAULT_SCRAPE_BASE_URL,
};

#[derive(Debug, Parser)]
#[command(
    name = "coinharvest",
    author,
    version,
    about = "Cryptocurrency metadata scraper and price-history loader"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Warehouse database file.
    #[arg(long, global = true, env = "COINHARVEST_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape description, category and price for each asset.
    ///
    /// Rebuilds `crypto_metadata` from scratch and writes the outcomes to CSV.
    Metadata(MetadataArgs),

    /// Append price history for each asset to `historical_prices`.
    ///
    /// Points already stored for the same coin and timestamp are skipped.
    History(HistoryArgs),

    /// Print the daily close prices stored for one asset.
    Prices(PricesArgs),

    /// Summarize past ingest runs from the audit log.
    Runs,

    /// Print the assets a run would process.
    Assets(AssetsArgs),
}

/// Where the list of assets comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssetSource {
    /// The built-in top-20 catalog.
    Catalog,
    /// The current top-N by market cap from the market-data API.
    Market,
}

#[derive(Debug, Clone, Args)]
pub struct MarketArgs {
    /// Market-data API base URL.
    #[arg(long, env = "COINGECKO_BASE_URL", default_value = DEFAULT_MARKET_BASE_URL)]
    pub market_base_url: String,

    /// Demo API key sent as `x-cg-demo-api-key`.
    #[arg(long, env = "COINGECKO_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Quote currency.
    #[arg(long, env = "VS_CURRENCY", default_value = "usd")]
    pub vs_currency: String,

    /// Number of assets to take from the top of the market-cap ranking.
    #[arg(long, env = "TOP_COINS", default_value_t = 20)]
    pub top: usize,

    /// Market-data request timeout in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    pub market_timeout_ms: u64,

    /// Retries for failed market-data requests.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,
}

#[derive(Debug, Args)]
pub struct MetadataArgs {
    /// Base URL of the site hosting `/currencies/{slug}/` pages.
    #[arg(long, env = "SCRAPE_BASE_URL", default_value = DEFAULT_SCRAPE_BASE_URL)]
    pub base_url: String,

    /// Assets fetched before each pause.
    #[arg(long, env = "SCRAPE_BATCH_SIZE", default_value_t = 5)]
    pub batch_size: usize,

    /// Pause between batches in seconds.
    #[arg(long, env = "SCRAPE_SLEEP_SECONDS", default_value_t = 10)]
    pub sleep_seconds: u64,

    /// Per-page request timeout in milliseconds.
    #[arg(long, env = "SCRAPE_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Stop fetching after this many seconds; remaining assets get N/A outcomes.
    #[arg(long, env = "SCRAPE_RUN_DEADLINE_SECONDS")]
    pub run_deadline_seconds: Option<u64>,

    /// Use a token bucket of this many requests per minute instead of batch pauses.
    #[arg(long, conflicts_with = "sleep_seconds")]
    pub requests_per_minute: Option<u32>,

    /// CSV file receiving the scrape outcomes.
    #[arg(long, env = "METADATA_CSV_PATH", default_value = DEFAULT_METADATA_CSV_PATH)]
    pub csv_path: PathBuf,

    /// Where the asset list comes from.
    #[arg(long, value_enum, default_value_t = AssetSource::Catalog)]
    pub assets: AssetSource,

    #[command(flatten)]
    pub market: MarketArgs,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Days of history to request, ending now.
    #[arg(long, env = "FETCH_DAYS", default_value_t = 365)]
    pub days: u32,

    /// Assets fetched before each pause.
    #[arg(long, env = "HISTORY_BATCH_SIZE", default_value_t = 5)]
    pub batch_size: usize,

    /// Pause between batches in seconds.
    #[arg(long, env = "HISTORY_SLEEP_SECONDS", default_value_t = 10)]
    pub sleep_seconds: u64,

    /// Load these coin ids instead of the current top-N.
    #[arg(long, value_delimiter = ',')]
    pub coins: Vec<String>,

    #[command(flatten)]
    pub market: MarketArgs,
}

#[derive(Debug, Args)]
pub struct PricesArgs {
    /// Canonical asset key, e.g. `bitcoin`.
    pub coin: String,

    /// Only print the most recent N days.
    #[arg(long)]
    pub last: Option<usize>,
}

#[derive(Debug, Args)]
pub struct AssetsArgs {
    #[arg(long, value_enum, default_value_t = AssetSource::Catalog)]
    pub source: AssetSource,

    #[command(flatten)]
    pub market: MarketArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn history_accepts_comma_separated_coins() {
        let cli = Cli::try_parse_from(["coinharvest", "history", "--coins", "bitcoin,ethereum"])
            .expect("parse");

        let Command::History(args) = cli.command else {
            panic!("expected history command");
        };
        assert_eq!(args.coins, vec!["bitcoin", "ethereum"]);
    }

    #[test]
    fn token_bucket_conflicts_with_explicit_sleep() {
        let result = Cli::try_parse_from([
            "coinharvest",
            "metadata",
            "--requests-per-minute",
            "30",
            "--sleep-seconds",
            "5",
        ]);

        assert!(result.is_err());
    }
}
