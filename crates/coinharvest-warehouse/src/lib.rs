//! # Coinharvest Warehouse
//!
//! DuckDB-backed storage layer for coinharvest.
//!
//! ## Overview
//!
//! The warehouse owns the two persisted entity types of the pipeline and the
//! rules for writing them:
//!
//! - **Metadata** (`crypto_metadata`) is a full-refresh snapshot. Every run
//!   drops and recreates the table, then inserts one row per scraped asset,
//!   each row in its own transaction.
//! - **Price history** (`historical_prices`) is append-only. The natural key
//!   `(coin, timestamp)` is unique and colliding inserts are absorbed, so
//!   re-running over overlapping ranges never duplicates rows.
//!
//! Writes go through an [`IngestSession`], which holds one read-write
//! connection for the whole run and hands it back to the pool when dropped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coinharvest_warehouse::{MetadataRecord, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let mut session = warehouse.session()?;
//!
//!     session.rebuild_metadata_table()?;
//!     let report = session.persist_metadata(&[MetadataRecord {
//!         coin: "bitcoin".to_string(),
//!         description: "Bitcoin is a decentralized currency.".to_string(),
//!         category: "Layer 1".to_string(),
//!         price: Some(64_321.10),
//!     }]);
//!
//!     println!("committed {} rows", report.committed);
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `crypto_metadata` | Latest scraped description/category/price per coin |
//! | `historical_prices` | Price time series keyed by `(coin, timestamp)` |
//! | `ingest_log` | One audit row per persistence unit |
//! | `schema_migrations` | Applied migration versions |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `vw_daily_prices` | Last price per coin and day |
//! | `vw_ingest_summary` | Unit outcomes per run |
//!
//! Reads go through typed accessors on [`Warehouse`]: [`Warehouse::daily_prices`],
//! [`Warehouse::price_points`], [`Warehouse::metadata_snapshot`] and
//! [`Warehouse::run_summaries`].

pub mod duckdb;
pub mod migrations;
pub mod views;

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::Connection;
use ::duckdb::ToSql;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for coinharvest data.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept per access mode.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let home = resolve_home();
        let db_path = env::var_os("COINHARVEST_DB_PATH")
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| home.join("warehouse.duckdb"));
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    /// Configuration rooted at `home`, with the database file inside it.
    pub fn in_dir(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            db_path: home.join("warehouse.duckdb"),
            home,
            max_pool_size: 2,
        }
    }
}

/// One day of `vw_daily_prices`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPrice {
    pub coin: String,
    /// Calendar day, formatted `YYYY-MM-DD`.
    pub price_date: String,
    pub close_price: f64,
}

/// A row of the current `crypto_metadata` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMetadata {
    pub id: i64,
    pub coin: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
}

/// Unit counts for one run and dataset, from `vw_ingest_summary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub dataset: String,
    pub committed_units: i64,
    pub rolled_back_units: i64,
    pub rows_written: i64,
}

/// One scraped metadata row, ready for insertion.
///
/// Text fields carry whatever the extractor resolved, including the `N/A`
/// sentinel; `price` is `None` when the price text did not normalize.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub coin: String,
    pub description: String,
    pub category: String,
    pub price: Option<f64>,
}

/// One observation of an asset's price history.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePointRecord {
    /// Source timestamp in epoch milliseconds.
    pub timestamp_ms: i64,
    pub price: f64,
    /// UTC calendar date of `timestamp_ms`, formatted `YYYY-MM-DD`.
    pub price_date: String,
}

/// Terminal state of one persistence unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Committed { inserted: usize, duplicates: usize },
    RolledBack { error: String },
}

impl UnitOutcome {
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    const fn status(&self) -> &'static str {
        match self {
            Self::Committed { .. } => "committed",
            Self::RolledBack { .. } => "rolled_back",
        }
    }
}

/// Aggregated unit outcomes for one persistence pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub committed: usize,
    pub rolled_back: usize,
    pub rows_written: usize,
    pub duplicates: usize,
}

impl IngestReport {
    pub fn record(&mut self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Committed {
                inserted,
                duplicates,
            } => {
                self.committed += 1;
                self.rows_written += inserted;
                self.duplicates += duplicates;
            }
            UnitOutcome::RolledBack { .. } => self.rolled_back += 1,
        }
    }
}

/// The main warehouse handle.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse, creating the database file and schema if needed.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Initialize database schema and views.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Start a write session holding one read-write connection for the run.
    ///
    /// The connection is released when the session is dropped, whichever
    /// way the caller leaves its scope.
    pub fn session(&self) -> Result<IngestSession, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let run_id = Uuid::new_v4();
        debug!(%run_id, "opened ingest session");
        Ok(IngestSession { connection, run_id })
    }

    /// Daily close prices for `coin`, oldest first.
    pub fn daily_prices(&self, coin: &str) -> Result<Vec<DailyPrice>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT coin, CAST(price_date AS VARCHAR), close_price FROM vw_daily_prices \
             WHERE coin = ? AND price_date IS NOT NULL \
             ORDER BY price_date",
        )?;
        let prices = statement
            .query_map(::duckdb::params![coin], |row| {
                Ok(DailyPrice {
                    coin: row.get(0)?,
                    price_date: row.get(1)?,
                    close_price: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(prices)
    }

    /// Stored price points for `coin`, ordered by timestamp.
    pub fn price_points(&self, coin: &str) -> Result<Vec<PricePointRecord>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT timestamp, price, COALESCE(CAST(price_date AS VARCHAR), '') \
             FROM historical_prices WHERE coin = ? ORDER BY timestamp",
        )?;
        let points = statement
            .query_map(::duckdb::params![coin], |row| {
                Ok(PricePointRecord {
                    timestamp_ms: row.get(0)?,
                    price: row.get(1)?,
                    price_date: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(points)
    }

    /// The last metadata snapshot in insertion order.
    ///
    /// Empty until the first metadata run has created the table.
    pub fn metadata_snapshot(&self) -> Result<Vec<StoredMetadata>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let tables: i64 = connection.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'crypto_metadata'",
            ::duckdb::params![],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Ok(Vec::new());
        }

        let mut statement = connection.prepare(
            "SELECT id, coin, description, category, price FROM crypto_metadata ORDER BY id",
        )?;
        let rows = statement
            .query_map(::duckdb::params![], |row| {
                Ok(StoredMetadata {
                    id: row.get(0)?,
                    coin: row.get(1)?,
                    description: row.get(2)?,
                    category: row.get(3)?,
                    price: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Committed and rolled back unit counts per run and dataset, oldest run first.
    pub fn run_summaries(&self) -> Result<Vec<RunSummary>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT run_id, dataset, committed_units, rolled_back_units, \
                    CAST(COALESCE(rows_written, 0) AS BIGINT) \
             FROM vw_ingest_summary ORDER BY started_at, dataset",
        )?;
        let summaries = statement
            .query_map(::duckdb::params![], |row| {
                Ok(RunSummary {
                    run_id: row.get(0)?,
                    dataset: row.get(1)?,
                    committed_units: row.get(2)?,
                    rolled_back_units: row.get(3)?,
                    rows_written: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }
}

/// A run-scoped write handle.
///
/// Every write method is one persistence unit: it either commits or rolls
/// back its own transaction, and a failed unit never aborts the session.
pub struct IngestSession {
    connection: PooledConnection,
    run_id: Uuid,
}

impl IngestSession {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Drop and recreate `crypto_metadata`, discarding the previous snapshot.
    ///
    /// # Errors
    /// Returns an error if the DDL fails; the previous table is kept in that case.
    pub fn rebuild_metadata_table(&mut self) -> Result<(), WarehouseError> {
        info!(run_id = %self.run_id, "rebuilding crypto_metadata");
        self.connection.execute_batch("BEGIN TRANSACTION")?;
        let result = self
            .connection
            .execute_batch(
                r#"
DROP TABLE IF EXISTS crypto_metadata;
DROP SEQUENCE IF EXISTS crypto_metadata_id_seq;
CREATE SEQUENCE crypto_metadata_id_seq START 1;
CREATE TABLE crypto_metadata (
    id BIGINT PRIMARY KEY DEFAULT nextval('crypto_metadata_id_seq'),
    coin TEXT NOT NULL CHECK (coin <> ''),
    description TEXT,
    category TEXT,
    price DOUBLE,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
            )
            .map_err(WarehouseError::from);
        finalize_transaction(&self.connection, result)
    }

    /// Insert one metadata row in its own transaction.
    pub fn insert_metadata(&mut self, record: &MetadataRecord) -> UnitOutcome {
        let result = self.in_transaction(|connection| {
            let params: [&dyn ToSql; 4] = [
                &record.coin,
                &record.description,
                &record.category,
                &record.price,
            ];
            connection.execute(
                "INSERT INTO crypto_metadata (coin, description, category, price) \
                 VALUES (?, ?, ?, ?)",
                params.as_slice(),
            )?;
            Ok(1)
        });

        let outcome = match result {
            Ok(inserted) => UnitOutcome::Committed {
                inserted,
                duplicates: 0,
            },
            Err(error) => {
                warn!(coin = %record.coin, %error, "metadata insert rolled back");
                UnitOutcome::RolledBack {
                    error: error.to_string(),
                }
            }
        };
        self.log_unit(&record.coin, "metadata", &outcome);
        outcome
    }

    /// Insert every record, one unit per row.
    pub fn persist_metadata(&mut self, records: &[MetadataRecord]) -> IngestReport {
        let mut report = IngestReport::default();
        for record in records {
            let outcome = self.insert_metadata(record);
            report.record(&outcome);
        }
        info!(
            run_id = %self.run_id,
            committed = report.committed,
            rolled_back = report.rolled_back,
            "metadata persisted"
        );
        report
    }

    /// Append one asset's price points as a single unit.
    ///
    /// Points whose `(coin, timestamp)` already exists, in the table or
    /// earlier in `points`, are skipped and counted as duplicates.
    pub fn ingest_price_points(&mut self, coin: &str, points: &[PricePointRecord]) -> UnitOutcome {
        let result = self.in_transaction(|connection| {
            let mut seen = HashSet::with_capacity(points.len());
            let mut statement = connection.prepare(
                "INSERT INTO historical_prices (coin, timestamp, price, price_date) \
                 VALUES (?, ?, ?, TRY_CAST(? AS DATE)) \
                 ON CONFLICT (coin, timestamp) DO NOTHING",
            )?;

            let mut rows_written = 0;
            for point in points {
                if !seen.insert(point.timestamp_ms) {
                    continue;
                }
                let params: [&dyn ToSql; 4] =
                    [&coin, &point.timestamp_ms, &point.price, &point.price_date];
                rows_written += statement.execute(params.as_slice())?;
            }
            Ok(rows_written)
        });

        let outcome = match result {
            Ok(inserted) => UnitOutcome::Committed {
                inserted,
                duplicates: points.len().saturating_sub(inserted),
            },
            Err(error) => {
                warn!(%coin, %error, "price history unit rolled back");
                UnitOutcome::RolledBack {
                    error: error.to_string(),
                }
            }
        };
        self.log_unit(coin, "historical_prices", &outcome);
        outcome
    }

    fn in_transaction<T>(
        &self,
        unit: impl FnOnce(&Connection) -> Result<T, WarehouseError>,
    ) -> Result<T, WarehouseError> {
        self.connection.execute_batch("BEGIN TRANSACTION")?;
        let result = unit(&self.connection);
        finalize_transaction(&self.connection, result)
    }

    fn log_unit(&self, coin: &str, dataset: &str, outcome: &UnitOutcome) {
        let run_id = self.run_id.to_string();
        let (rows_written, detail) = match outcome {
            UnitOutcome::Committed { inserted, .. } => (Some(*inserted as i64), None),
            UnitOutcome::RolledBack { error } => (None, Some(error.as_str())),
        };
        let params: [&dyn ToSql; 6] = [
            &run_id,
            &coin,
            &dataset,
            &outcome.status(),
            &rows_written,
            &detail,
        ];
        if let Err(error) = self.connection.execute(
            "INSERT INTO ingest_log (run_id, coin, dataset, status, rows_written, detail, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        ) {
            warn!(%coin, %error, "failed to write ingest_log entry");
        }
    }
}

impl Drop for IngestSession {
    fn drop(&mut self) {
        debug!(run_id = %self.run_id, "closing ingest session");
    }
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => match connection.execute_batch("COMMIT") {
            Ok(()) => Ok(value),
            Err(error) => {
                let _ = connection.execute_batch("ROLLBACK");
                Err(error.into())
            }
        },
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn resolve_home() -> PathBuf {
    if let Some(path) = env::var_os("COINHARVEST_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".coinharvest");
    }

    PathBuf::from(".coinharvest")
}
