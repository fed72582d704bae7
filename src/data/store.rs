//! Market Data Store: persists OHLCV bars in the `market_data` table (§6), keyed by
//! `(exchange, symbol, timeframe, timestamp)`, and serves contiguous windowed reads ordered
//! by timestamp. Bootstraps a symbol/interval pair from its CSV file (convention:
//! `<root>/<symbol>_<interval>.csv`) the first time it's requested, then serves every
//! subsequent read from the database.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{info, instrument};

use crate::data::bar::{validate_series, Bar};
use crate::data::interval::Interval;
use crate::error::{EvoError, Result};

/// All bars are attributed to this exchange until the crate grows a real multi-exchange
/// ingestion path; `exchanges`/`symbols` still exist as separate tables per §6 so that path
/// is additive, not a migration.
const DEFAULT_EXCHANGE: &str = "default";

/// Row shape as it appears in a market data CSV file.
#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<BarRecord> for Bar {
    fn from(r: BarRecord) -> Self {
        Bar {
            timestamp: r.timestamp,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
        }
    }
}

/// Persists and serves OHLCV bars (§6 Market Data Store). Shares its connection pool with
/// [`crate::persistence::repository::Repository`] rather than opening a second one against
/// the same database file.
pub struct MarketDataStore {
    pool: SqlitePool,
    root: PathBuf,
}

impl MarketDataStore {
    pub fn new(pool: SqlitePool, root: impl Into<PathBuf>) -> Self {
        Self { pool, root: root.into() }
    }

    fn csv_path_for(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.root.join(format!("{}_{}.csv", symbol, interval))
    }

    /// Returns the bars for `symbol`/`interval` in timestamp order. If the pair has never
    /// been ingested, bootstraps it from the CSV convention path and persists the result
    /// before returning it.
    #[instrument(level = "debug", skip(self))]
    pub async fn load(&self, symbol: &str, interval: Interval) -> Result<Vec<Bar>> {
        let (exchange_id, symbol_id) = self.resolve_ids(symbol).await?;

        let rows = sqlx::query(
            "SELECT * FROM market_data WHERE exchange_id = ?1 AND symbol_id = ?2 AND timeframe = ?3 \
             ORDER BY timestamp ASC",
        )
        .bind(exchange_id)
        .bind(symbol_id)
        .bind(interval.to_string())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            let path = self.csv_path_for(symbol, interval);
            let bars = load_csv(&path)?;
            self.store_bars(exchange_id, symbol_id, interval, &bars).await?;
            info!(symbol, %interval, count = bars.len(), "bootstrapped market data from csv");
            return Ok(bars);
        }

        rows.into_iter()
            .map(|row| {
                Ok(Bar {
                    timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("timestamp"))
                        .map_err(|e| EvoError::invalid_input(format!("bad market_data timestamp: {}", e)))?
                        .with_timezone(&Utc),
                    open: row.get::<f64, _>("open"),
                    high: row.get::<f64, _>("high"),
                    low: row.get::<f64, _>("low"),
                    close: row.get::<f64, _>("close"),
                    volume: row.get::<f64, _>("volume"),
                })
            })
            .collect()
    }

    async fn resolve_ids(&self, symbol: &str) -> Result<(i64, i64)> {
        sqlx::query("INSERT OR IGNORE INTO exchanges (name) VALUES (?1)")
            .bind(DEFAULT_EXCHANGE)
            .execute(&self.pool)
            .await?;
        let exchange_id: i64 = sqlx::query("SELECT id FROM exchanges WHERE name = ?1")
            .bind(DEFAULT_EXCHANGE)
            .fetch_one(&self.pool)
            .await?
            .get("id");

        sqlx::query("INSERT OR IGNORE INTO symbols (exchange_id, symbol) VALUES (?1, ?2)")
            .bind(exchange_id)
            .bind(symbol)
            .execute(&self.pool)
            .await?;
        let symbol_id: i64 = sqlx::query("SELECT id FROM symbols WHERE exchange_id = ?1 AND symbol = ?2")
            .bind(exchange_id)
            .bind(symbol)
            .fetch_one(&self.pool)
            .await?
            .get("id");

        Ok((exchange_id, symbol_id))
    }

    async fn store_bars(&self, exchange_id: i64, symbol_id: i64, interval: Interval, bars: &[Bar]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for bar in bars {
            sqlx::query(
                "INSERT OR IGNORE INTO market_data \
                 (exchange_id, symbol_id, timeframe, timestamp, open, high, low, close, volume) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(exchange_id)
            .bind(symbol_id)
            .bind(interval.to_string())
            .bind(bar.timestamp.to_rfc3339())
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Reads a CSV file of bars and hands the parsed rows to [`ingest_bars`] for validation.
fn load_csv(path: &Path) -> Result<Vec<Bar>> {
    if !path.exists() {
        return Err(EvoError::insufficient_data(format!(
            "market data file not found: {}",
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();
    for result in reader.deserialize() {
        let record: BarRecord = result?;
        bars.push(Bar::from(record));
    }

    ingest_bars(bars)
}

/// Boundary adapter (§6 external interface (a)): validates a batch of bars parsed upstream
/// by a downloader or file reader, rejecting the whole batch if any bar or the series-level
/// monotonicity invariant fails. The only gate a bar must pass before it can be stored.
pub fn ingest_bars(bars: Vec<Bar>) -> Result<Vec<Bar>> {
    validate_series(&bars)?;
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::schema::CREATE_TABLES;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::io::Write;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(CREATE_TABLES).execute(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn bootstraps_from_csv_then_serves_from_db() {
        let dir = tempdir_path("bootstrap");
        std::fs::create_dir_all(&dir).unwrap();
        let file_path = dir.join("BTCUSD_1h.csv");
        let mut f = std::fs::File::create(&file_path).unwrap();
        writeln!(f, "timestamp,open,high,low,close,volume").unwrap();
        writeln!(f, "2024-01-01T00:00:00Z,100,105,95,102,10").unwrap();
        writeln!(f, "2024-01-01T01:00:00Z,102,108,100,106,12").unwrap();
        drop(f);

        let store = MarketDataStore::new(memory_pool().await, &dir);
        let bars = store.load("BTCUSD", Interval::OneHour).await.unwrap();
        assert_eq!(bars.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
        let reloaded = store.load("BTCUSD", Interval::OneHour).await.unwrap();
        assert_eq!(reloaded.len(), 2, "second read must come from the db, not the deleted csv");
    }

    #[tokio::test]
    async fn missing_csv_on_first_load_is_insufficient_data_error() {
        let store = MarketDataStore::new(memory_pool().await, "/nonexistent/evocrate-test-path");
        let err = store.load("BTCUSD", Interval::OneHour).await.unwrap_err();
        assert!(matches!(err, EvoError::InsufficientData(_)));
    }

    #[test]
    fn ingest_bars_rejects_non_monotonic_batch() {
        let bars = vec![
            Bar { timestamp: Utc::now(), open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 },
            Bar { timestamp: Utc::now() - chrono::Duration::hours(1), open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 },
        ];
        assert!(ingest_bars(bars).is_err());
    }

    fn tempdir_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("evocrate-store-test-{}-{}", label, std::process::id()))
    }
}
