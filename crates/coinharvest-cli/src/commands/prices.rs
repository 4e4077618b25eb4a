//! Read back what the history and metadata runs stored.

use coinharvest_core::{DailyPrice, RunSummary};
use serde::Serialize;

use crate::cli::{Cli, PricesArgs};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct PricesResponseData {
    coin: String,
    days: usize,
    prices: Vec<DailyPrice>,
}

#[derive(Debug, Serialize)]
struct RunsResponseData {
    runs: Vec<RunSummary>,
}

pub fn run(args: &PricesArgs, cli: &Cli) -> Result<CommandResult, CliError> {
    let warehouse = super::open_warehouse(cli)?;
    let coin = args.coin.trim().to_ascii_lowercase();

    let prices = most_recent(warehouse.daily_prices(&coin)?, args.last);
    let warning = prices
        .is_empty()
        .then(|| format!("no stored prices for '{coin}'"));
    let mut result = CommandResult::ok(serde_json::to_value(PricesResponseData {
        coin,
        days: prices.len(),
        prices,
    })?);
    if let Some(warning) = warning {
        result = result.with_warning(warning);
    }
    Ok(result)
}

pub fn runs(cli: &Cli) -> Result<CommandResult, CliError> {
    let warehouse = super::open_warehouse(cli)?;
    let runs = warehouse.run_summaries()?;
    Ok(CommandResult::ok(serde_json::to_value(RunsResponseData {
        runs,
    })?))
}

/// Keep the last `count` entries of an oldest-first series.
fn most_recent(mut prices: Vec<DailyPrice>, count: Option<usize>) -> Vec<DailyPrice> {
    if let Some(count) = count {
        let skip = prices.len().saturating_sub(count);
        prices.drain(..skip);
    }
    prices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(price_date: &str) -> DailyPrice {
        DailyPrice {
            coin: String::from("bitcoin"),
            price_date: price_date.to_owned(),
            close_price: 1.0,
        }
    }

    #[test]
    fn last_keeps_the_newest_days() {
        let series = vec![day("2024-03-01"), day("2024-03-02"), day("2024-03-03")];

        let kept = most_recent(series.clone(), Some(2));

        assert_eq!(kept, vec![day("2024-03-02"), day("2024-03-03")]);
        assert_eq!(most_recent(series.clone(), Some(10)).len(), 3);
        assert_eq!(most_recent(series, None).len(), 3);
    }
}
