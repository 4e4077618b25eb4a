use std::sync::Arc;

use coinharvest_warehouse::{IngestReport, IngestSession, PricePointRecord, UnitOutcome};
use serde::Serialize;
use tracing::{info, warn};

use crate::market::{HistoryRange, MarketDataClient};
use crate::pacing::PacingPolicy;
use crate::ValidationError;

/// What happened to one asset during a history load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetHistory {
    pub coin: String,
    /// Price points returned by the market-data API.
    pub fetched: usize,
    /// `None` when the fetch failed and nothing was written.
    pub unit: Option<UnitOutcome>,
    pub fetch_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryReport {
    pub assets: Vec<AssetHistory>,
    pub fetch_failures: usize,
    pub persistence: IngestReport,
}

/// Loads price history asset by asset, one persistence unit per asset.
pub struct HistoryPipeline {
    client: MarketDataClient,
    pacing: Arc<dyn PacingPolicy>,
    batch_size: usize,
}

impl HistoryPipeline {
    pub fn new(
        client: MarketDataClient,
        pacing: Arc<dyn PacingPolicy>,
        batch_size: usize,
    ) -> Result<Self, ValidationError> {
        if batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        Ok(Self {
            client,
            pacing,
            batch_size,
        })
    }

    /// Fetch and append history for each coin in order.
    ///
    /// A fetch failure or a rolled back unit is recorded and the run moves on
    /// to the next coin.
    pub async fn run(
        &self,
        session: &mut IngestSession,
        coin_ids: &[String],
        range: HistoryRange,
    ) -> HistoryReport {
        let mut report = HistoryReport::default();
        let batch_count = coin_ids.len().div_ceil(self.batch_size);

        for (batch_index, batch) in coin_ids.chunks(self.batch_size).enumerate() {
            for coin in batch {
                self.pacing.before_request().await;
                let entry = match self.client.price_history(coin, range).await {
                    Ok(points) => {
                        let records: Vec<PricePointRecord> =
                            points.iter().map(|point| point.to_record()).collect();
                        let outcome = session.ingest_price_points(coin, &records);
                        report.persistence.record(&outcome);
                        if let UnitOutcome::Committed {
                            inserted,
                            duplicates,
                        } = &outcome
                        {
                            info!(%coin, fetched = records.len(), inserted, duplicates, "stored price history");
                        }
                        AssetHistory {
                            coin: coin.clone(),
                            fetched: records.len(),
                            unit: Some(outcome),
                            fetch_error: None,
                        }
                    }
                    Err(error) => {
                        warn!(%coin, code = error.code(), %error, "price history fetch failed");
                        report.fetch_failures += 1;
                        AssetHistory {
                            coin: coin.clone(),
                            fetched: 0,
                            unit: None,
                            fetch_error: Some(error.to_string()),
                        }
                    }
                };
                report.assets.push(entry);
            }

            if batch_index + 1 < batch_count {
                self.pacing.pause_after_batch(batch_index).await;
            }
        }

        info!(
            assets = report.assets.len(),
            committed = report.persistence.committed,
            rolled_back = report.persistence.rolled_back,
            fetch_failures = report.fetch_failures,
            "history load finished"
        );
        report
    }
}
