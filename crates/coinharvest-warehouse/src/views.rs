//! Database views read by the dashboard.

use ::duckdb::Connection;

/// Create the analytical views over `historical_prices`.
///
/// - `vw_daily_prices`: last observed price per coin and calendar day
/// - `vw_ingest_summary`: committed and rolled back units per run
///
/// # Errors
/// Returns an error if the view creation SQL fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_daily_prices AS
SELECT
    coin,
    price_date,
    arg_max(price, timestamp) AS close_price
FROM historical_prices
GROUP BY coin, price_date;

CREATE OR REPLACE VIEW vw_ingest_summary AS
SELECT
    run_id,
    dataset,
    COUNT(*) FILTER (WHERE status = 'committed') AS committed_units,
    COUNT(*) FILTER (WHERE status = 'rolled_back') AS rolled_back_units,
    SUM(rows_written) AS rows_written,
    MIN(timestamp) AS started_at
FROM ingest_log
GROUP BY run_id, dataset;
",
    )?;

    Ok(())
}
