//! # Coinharvest Core
//!
//! Extraction and ingestion pipeline for cryptocurrency metadata and price
//! history.
//!
//! ## Overview
//!
//! - **Price normalization** from free-text currency strings
//! - **Field extraction** with ordered, named fallback strategies per field
//! - **Page fetching** with a bounded timeout and classified failures
//! - **Batch orchestration** with injected pacing and per-asset isolation
//! - **Market-data client** for top-N lists and price history, with retries
//! - **History pipeline** writing one persistence unit per asset
//!
//! Storage lives in [`coinharvest_warehouse`]; its public types are
//! re-exported here.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Scrape and market-data settings with validation |
//! | [`domain`] | Assets, scrape outcomes and price points |
//! | [`error`] | Core error types |
//! | [`export`] | CSV export of scrape outcomes |
//! | [`extract`] | Field chains and the field extractor |
//! | [`fetch`] | Asset page fetcher and fetch failures |
//! | [`history`] | Price-history load into the warehouse |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`market`] | Market-data API client |
//! | [`orchestrator`] | Batched scrape runs |
//! | [`pacing`] | Inter-request and inter-batch pacing policies |
//! | [`price`] | Price text normalization |
//! | [`retry`] | Retry schedule for market-data requests |
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌─────────────────┐
//! │ AssetCatalog │────▶│ BatchOrchestrator │────▶│  PageFetcher    │
//! └──────────────┘     │  (PacingPolicy)   │     └────────┬────────┘
//!                      └─────────┬─────────┘              │ html
//!                                │                        ▼
//!                                │               ┌─────────────────┐
//!                                │◀──────────────│ FieldExtractor  │
//!                                ▼               └─────────────────┘
//!                      ┌───────────────────┐
//!                      │  ScrapeOutcomes   │──▶ CSV export
//!                      └─────────┬─────────┘
//!                                ▼
//!                      ┌───────────────────┐
//!                      │   IngestSession   │
//!                      └───────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use coinharvest_core::{
//!     AssetCatalog, BatchOrchestrator, FieldExtractor, FixedDelay, PageFetcher,
//!     ReqwestHttpClient, ScrapeConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScrapeConfig::default();
//!     let fetcher = PageFetcher::from_config(Arc::new(ReqwestHttpClient::new()), &config);
//!     let orchestrator = BatchOrchestrator::new(
//!         fetcher,
//!         FieldExtractor::default(),
//!         Arc::new(FixedDelay(Duration::from_secs(10))),
//!         config.batch_size,
//!     )?;
//!
//!     let outcomes = orchestrator.run(AssetCatalog::default().assets()).await;
//!     for outcome in &outcomes {
//!         println!("{}: {}", outcome.coin, outcome.price_text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod history;
pub mod http_client;
pub mod market;
pub mod orchestrator;
pub mod pacing;
pub mod price;
pub mod retry;

pub use config::{MarketConfig, ScrapeConfig};
pub use domain::{Asset, AssetCatalog, PricePoint, ScrapeOutcome, SENTINEL};
pub use error::{CoreError, SourceError, SourceErrorKind, ValidationError};
pub use export::{write_outcomes, write_outcomes_csv};
pub use extract::{
    CategoryOverrides, Document, FieldChain, FieldExtractor, NamedStrategy, Resolution,
};
pub use fetch::{FetchFailure, PageFetcher, BROWSER_USER_AGENT};
pub use history::{AssetHistory, HistoryPipeline, HistoryReport};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use market::{HistoryRange, MarketDataClient};
pub use orchestrator::BatchOrchestrator;
pub use pacing::{FixedDelay, NoDelay, PacingFuture, PacingPolicy, TokenBucket};
pub use price::normalize_price;
pub use retry::{Backoff, RetryConfig};

// Warehouse (re-exported from coinharvest-warehouse)
pub use coinharvest_warehouse::{
    DailyPrice, IngestReport, IngestSession, MetadataRecord, PricePointRecord, RunSummary,
    StoredMetadata, UnitOutcome, Warehouse, WarehouseConfig, WarehouseError,
};
