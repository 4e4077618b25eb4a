use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::{Asset, ScrapeOutcome};
use crate::extract::{Document, FieldExtractor, Resolution};
use crate::fetch::PageFetcher;
use crate::pacing::PacingPolicy;
use crate::ValidationError;

/// Scrapes assets in fixed-size groups, isolating every per-asset failure.
pub struct BatchOrchestrator {
    fetcher: PageFetcher,
    extractor: FieldExtractor,
    pacing: Arc<dyn PacingPolicy>,
    batch_size: usize,
    run_deadline: Option<Duration>,
}

impl BatchOrchestrator {
    pub fn new(
        fetcher: PageFetcher,
        extractor: FieldExtractor,
        pacing: Arc<dyn PacingPolicy>,
        batch_size: usize,
    ) -> Result<Self, ValidationError> {
        if batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        Ok(Self {
            fetcher,
            extractor,
            pacing,
            batch_size,
            run_deadline: None,
        })
    }

    /// Stop fetching once `deadline` has elapsed since the run started.
    pub fn with_run_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.run_deadline = deadline;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// One outcome per input asset, in input order.
    pub async fn run(&self, assets: &[Asset]) -> Vec<ScrapeOutcome> {
        let started = Instant::now();
        let batch_count = assets.len().div_ceil(self.batch_size);
        let mut outcomes = Vec::with_capacity(assets.len());
        let mut expired = false;

        for (batch_index, batch) in assets.chunks(self.batch_size).enumerate() {
            info!(
                batch = batch_index + 1,
                of = batch_count,
                size = batch.len(),
                "scraping batch"
            );

            for asset in batch {
                if !expired && self.deadline_passed(started) {
                    expired = true;
                    warn!(
                        remaining = assets.len() - outcomes.len(),
                        "run deadline reached; remaining assets get unavailable outcomes"
                    );
                }
                if expired {
                    outcomes.push(ScrapeOutcome::unavailable(asset.canonical_key()));
                    continue;
                }

                self.pacing.before_request().await;
                outcomes.push(self.scrape_one(asset).await);
            }

            // No pause after the last batch; nothing is waiting on it.
            if !expired && batch_index + 1 < batch_count {
                self.pacing.pause_after_batch(batch_index).await;
            }
        }

        let unavailable = outcomes.iter().filter(|outcome| outcome.is_unavailable()).count();
        info!(
            assets = outcomes.len(),
            unavailable,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scrape run finished"
        );
        outcomes
    }

    async fn scrape_one(&self, asset: &Asset) -> ScrapeOutcome {
        match self.fetcher.fetch(asset).await {
            Ok(html) => {
                let (outcome, resolution) = extract_page(&self.extractor, &html, asset);
                if resolution == Resolution::default() {
                    warn!(coin = asset.canonical_key(), "page fetched but no field resolved");
                }
                outcome
            }
            Err(failure) => {
                warn!(
                    coin = asset.canonical_key(),
                    code = failure.code(),
                    transient = failure.is_transient(),
                    %failure,
                    "asset page unavailable"
                );
                ScrapeOutcome::unavailable(asset.canonical_key())
            }
        }
    }

    fn deadline_passed(&self, started: Instant) -> bool {
        self.run_deadline
            .is_some_and(|deadline| started.elapsed() >= deadline)
    }
}

/// Parse and extract without holding the document across an await point.
fn extract_page(extractor: &FieldExtractor, html: &str, asset: &Asset) -> (ScrapeOutcome, Resolution) {
    let document = Document::parse(html);
    extractor.extract_with_resolution(&document, asset)
}
