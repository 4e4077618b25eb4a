use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

/// `crypto_metadata` is not migrated: it is rebuilt by every metadata run.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_historical_prices",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS historical_prices_id_seq START 1;

CREATE TABLE IF NOT EXISTS historical_prices (
    id BIGINT PRIMARY KEY DEFAULT nextval('historical_prices_id_seq'),
    coin TEXT NOT NULL,
    timestamp BIGINT NOT NULL,
    price DOUBLE NOT NULL,
    price_date DATE,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (coin, timestamp)
);

CREATE TABLE IF NOT EXISTS ingest_log (
    run_id TEXT NOT NULL,
    coin TEXT,
    dataset TEXT NOT NULL,
    status TEXT NOT NULL,
    rows_written BIGINT,
    detail TEXT,
    timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_historical_prices_coin_date ON historical_prices(coin, price_date);
CREATE INDEX IF NOT EXISTS idx_ingest_log_run ON ingest_log(run_id, dataset);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            ::duckdb::params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            tracing::debug!(version = migration.version, "applying warehouse migration");
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                ::duckdb::params![migration.version],
            )?;
        }
    }

    Ok(())
}
