//! Append price history for the top-N assets to `historical_prices`.

use std::sync::Arc;

use coinharvest_core::{
    FixedDelay, HistoryPipeline, HistoryRange, HistoryReport, MarketConfig, ReqwestHttpClient,
};
use serde::Serialize;
use tracing::info;

use crate::cli::{Cli, HistoryArgs};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct HistoryResponseData {
    run_id: String,
    days: u32,
    coins: Vec<String>,
    report: HistoryReport,
}

pub async fn run(args: &HistoryArgs, cli: &Cli) -> Result<CommandResult, CliError> {
    let config = MarketConfig {
        fetch_days: args.days,
        batch_size: args.batch_size,
        batch_pause: super::seconds(args.sleep_seconds),
        ..super::market_config(&args.market)
    };
    config.validate()?;

    let warehouse = super::open_warehouse(cli)?;
    let client = super::market_client(Arc::new(ReqwestHttpClient::new()), &config, &args.market);

    let coins = if args.coins.is_empty() {
        client.top_assets(config.top_coins).await?
    } else {
        requested_coins(&args.coins)
    };
    if coins.is_empty() {
        return Err(CliError::Command(String::from("no coins to load")));
    }

    let pipeline = HistoryPipeline::new(
        client,
        Arc::new(FixedDelay(config.batch_pause)),
        config.batch_size,
    )?;
    let range = HistoryRange::trailing_days(config.fetch_days);

    let mut session = warehouse.session()?;
    let run_id = session.run_id().to_string();
    let report = pipeline.run(&mut session, &coins, range).await;
    drop(session);

    info!(
        %run_id,
        coins = coins.len(),
        fetch_failures = report.fetch_failures,
        rows_written = report.persistence.rows_written,
        duplicates = report.persistence.duplicates,
        "history run finished"
    );

    let mut warnings = Vec::new();
    if report.fetch_failures > 0 {
        warnings.push(format!("{} coins could not be fetched", report.fetch_failures));
    }
    if report.persistence.rolled_back > 0 {
        warnings.push(format!(
            "{} coins were rolled back",
            report.persistence.rolled_back
        ));
    }

    let data = serde_json::to_value(HistoryResponseData {
        run_id,
        days: config.fetch_days,
        coins,
        report,
    })?;
    Ok(CommandResult::ok(data).with_warnings(warnings))
}

/// Trimmed, lowercased ids with blanks and repeats removed, order kept.
fn requested_coins(raw: &[String]) -> Vec<String> {
    let mut coins: Vec<String> = Vec::with_capacity(raw.len());
    for id in raw {
        let id = id.trim().to_ascii_lowercase();
        if !id.is_empty() && !coins.contains(&id) {
            coins.push(id);
        }
    }
    coins
}
