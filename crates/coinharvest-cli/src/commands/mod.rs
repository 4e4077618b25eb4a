mod assets;
mod history;
mod metadata;
mod prices;

use std::sync::Arc;
use std::time::Duration;

use coinharvest_core::{
    HttpClient, MarketConfig, MarketDataClient, RetryConfig, Warehouse, WarehouseConfig,
};
use serde_json::Value;

use crate::cli::{Cli, Command, MarketArgs};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Metadata(args) => metadata::run(args, cli).await,
        Command::History(args) => history::run(args, cli).await,
        Command::Prices(args) => prices::run(args, cli),
        Command::Runs => prices::runs(cli),
        Command::Assets(args) => assets::run(args).await,
    }
}

/// Open the warehouse, honouring `--db-path` over the environment defaults.
fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let mut config = WarehouseConfig::default();
    if let Some(db_path) = &cli.db_path {
        config.db_path = db_path.clone();
    }
    Ok(Warehouse::open(config)?)
}

/// Market settings from the shared flags; batching fields keep their defaults
/// unless the caller overrides them.
fn market_config(args: &MarketArgs) -> MarketConfig {
    MarketConfig {
        base_url: args.market_base_url.clone(),
        api_key: args.api_key.clone(),
        vs_currency: args.vs_currency.trim().to_ascii_lowercase(),
        top_coins: args.top,
        timeout_ms: args.market_timeout_ms,
        ..MarketConfig::default()
    }
}

fn market_client(
    http_client: Arc<dyn HttpClient>,
    config: &MarketConfig,
    args: &MarketArgs,
) -> MarketDataClient {
    let retry = RetryConfig {
        max_retries: args.max_retries,
        ..RetryConfig::default()
    };
    MarketDataClient::new(http_client, config).with_retry(retry)
}

fn seconds(value: u64) -> Duration {
    Duration::from_secs(value)
}
