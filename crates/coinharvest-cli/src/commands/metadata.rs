//! Scrape asset pages, rebuild `crypto_metadata` and export the outcomes.

use std::sync::Arc;
use std::time::Duration;

use coinharvest_core::{
    write_outcomes_csv, AssetCatalog, BatchOrchestrator, FieldExtractor, FixedDelay,
    IngestReport, MetadataRecord, PacingPolicy, PageFetcher, ReqwestHttpClient, ScrapeConfig,
    ScrapeOutcome, TokenBucket,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{AssetSource, Cli, MetadataArgs};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct MetadataResponseData {
    run_id: String,
    assets: usize,
    unavailable: usize,
    persistence: IngestReport,
    csv_path: String,
    csv_rows: Option<usize>,
    outcomes: Vec<ScrapeOutcome>,
}

pub async fn run(args: &MetadataArgs, cli: &Cli) -> Result<CommandResult, CliError> {
    let config = ScrapeConfig {
        base_url: args.base_url.clone(),
        batch_size: args.batch_size,
        batch_pause: super::seconds(args.sleep_seconds),
        timeout_ms: args.timeout_ms,
        run_deadline: args.run_deadline_seconds.map(super::seconds),
        csv_path: args.csv_path.clone(),
    };
    config.validate()?;

    let pacing = pacing_policy(&config, args.requests_per_minute)?;

    // Open the store before any network work so a bad path fails fast.
    let warehouse = super::open_warehouse(cli)?;

    let assets = match args.assets {
        AssetSource::Catalog => AssetCatalog::default().assets().to_vec(),
        AssetSource::Market => super::assets::market_assets(&args.market).await?,
    };

    let fetcher = PageFetcher::from_config(Arc::new(ReqwestHttpClient::new()), &config);
    let orchestrator =
        BatchOrchestrator::new(fetcher, FieldExtractor::default(), pacing, config.batch_size)?
            .with_run_deadline(config.run_deadline);
    let outcomes = orchestrator.run(&assets).await;
    let unavailable = outcomes.iter().filter(|outcome| outcome.is_unavailable()).count();

    let mut session = warehouse.session()?;
    session.rebuild_metadata_table()?;
    let records: Vec<MetadataRecord> = outcomes.iter().map(ScrapeOutcome::to_record).collect();
    let persistence = session.persist_metadata(&records);
    let run_id = session.run_id().to_string();
    drop(session);

    let mut warnings = Vec::new();
    if persistence.rolled_back > 0 {
        warnings.push(format!(
            "{} metadata rows were rolled back",
            persistence.rolled_back
        ));
    }
    let csv_rows = match write_outcomes_csv(&config.csv_path, &outcomes) {
        Ok(rows) => Some(rows),
        Err(error) => {
            warn!(path = %config.csv_path.display(), %error, "csv export failed");
            warnings.push(format!("csv export failed: {error}"));
            None
        }
    };

    info!(
        %run_id,
        assets = outcomes.len(),
        unavailable,
        rows_written = persistence.rows_written,
        "metadata run finished"
    );

    let data = serde_json::to_value(MetadataResponseData {
        run_id,
        assets: outcomes.len(),
        unavailable,
        persistence,
        csv_path: config.csv_path.display().to_string(),
        csv_rows,
        outcomes,
    })?;
    Ok(CommandResult::ok(data).with_warnings(warnings))
}

/// Token bucket when a per-minute rate is given, otherwise a fixed pause
/// between batches.
fn pacing_policy(
    config: &ScrapeConfig,
    requests_per_minute: Option<u32>,
) -> Result<Arc<dyn PacingPolicy>, CliError> {
    match requests_per_minute {
        Some(0) => Err(CliError::Command(String::from(
            "--requests-per-minute must be greater than zero",
        ))),
        Some(limit) => Ok(Arc::new(TokenBucket::new(Duration::from_secs(60), limit))),
        None => Ok(Arc::new(FixedDelay(config.batch_pause))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_is_rejected() {
        let result = pacing_policy(&ScrapeConfig::default(), Some(0));

        assert!(matches!(result, Err(CliError::Command(_))));
    }

    #[test]
    fn rate_selects_a_policy() {
        assert!(pacing_policy(&ScrapeConfig::default(), Some(30)).is_ok());
        assert!(pacing_policy(&ScrapeConfig::default(), None).is_ok());
    }
}
