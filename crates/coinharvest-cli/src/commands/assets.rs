//! List the assets a scrape or history run would process.

use std::sync::Arc;

use coinharvest_core::{Asset, AssetCatalog, ReqwestHttpClient};
use serde::Serialize;

use crate::cli::{AssetSource, AssetsArgs, MarketArgs};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct AssetsResponseData {
    source: &'static str,
    count: usize,
    assets: Vec<Asset>,
}

pub async fn run(args: &AssetsArgs) -> Result<CommandResult, CliError> {
    let (source, assets) = match args.source {
        AssetSource::Catalog => ("catalog", AssetCatalog::default().assets().to_vec()),
        AssetSource::Market => ("market", market_assets(&args.market).await?),
    };

    let data = serde_json::to_value(AssetsResponseData {
        source,
        count: assets.len(),
        assets,
    })?;
    Ok(CommandResult::ok(data))
}

/// Current top-N ids from the market-data API, mapped onto catalog slugs.
pub(super) async fn market_assets(args: &MarketArgs) -> Result<Vec<Asset>, CliError> {
    let config = super::market_config(args);
    config.validate()?;

    let client = super::market_client(Arc::new(ReqwestHttpClient::new()), &config, args);
    let ids = client.top_assets(config.top_coins).await?;
    Ok(AssetCatalog::default().resolve(&ids))
}
