//! Read-through cache in front of [`crate::data::store::MarketDataStore`]. A TTL'd
//! in-memory map keyed by the same (symbol, interval) pair the store uses, re-fetching
//! on expiry or miss.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::data::bar::Bar;
use crate::data::interval::Interval;
use crate::data::store::MarketDataStore;
use crate::error::Result;

const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    bars: Vec<Bar>,
    fetched_at: Instant,
}

/// Thread-safe read-through cache. One instance is shared across the worker pool so
/// concurrent fitness evaluations against the same symbol/interval hit the store once.
pub struct MarketDataCache {
    store: MarketDataStore,
    ttl: Duration,
    entries: Mutex<HashMap<(String, Interval), CacheEntry>>,
}

impl MarketDataCache {
    pub fn new(store: MarketDataStore) -> Self {
        Self {
            store,
            ttl: DEFAULT_TTL,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(store: MarketDataStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns cached bars for `symbol`/`interval`, refreshing from the store if absent
    /// or older than the configured TTL.
    pub async fn get(&self, symbol: &str, interval: Interval) -> Result<Vec<Bar>> {
        let key = (symbol.to_string(), interval);

        {
            let entries = self.entries.lock().expect("cache mutex poisoned");
            if let Some(entry) = entries.get(&key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    debug!(symbol, %interval, "market data cache hit");
                    return Ok(entry.bars.clone());
                }
            }
        }

        debug!(symbol, %interval, "market data cache miss, loading from store");
        let bars = self.store.load(symbol, interval).await?;

        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            key,
            CacheEntry {
                bars: bars.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(bars)
    }

    pub fn invalidate(&self, symbol: &str, interval: Interval) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.remove(&(symbol.to_string(), interval));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::schema::CREATE_TABLES;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_csv(dir: &PathBuf, symbol: &str, interval: Interval) {
        std::fs::create_dir_all(dir).unwrap();
        let file_path = dir.join(format!("{}_{}.csv", symbol, interval));
        let mut f = std::fs::File::create(&file_path).unwrap();
        writeln!(f, "timestamp,open,high,low,close,volume").unwrap();
        writeln!(f, "2024-01-01T00:00:00Z,100,105,95,102,10").unwrap();
    }

    async fn memory_pool() -> sqlx::sqlite::SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(CREATE_TABLES).execute(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn repeated_get_hits_cache_not_disk() {
        let dir = std::env::temp_dir().join(format!("evocrate-cache-test-{}", std::process::id()));
        write_csv(&dir, "ETHUSD", Interval::OneDay);

        let cache = MarketDataCache::new(MarketDataStore::new(memory_pool().await, &dir));
        let first = cache.get("ETHUSD", Interval::OneDay).await.unwrap();
        assert_eq!(first.len(), 1);

        // Remove the backing file; a cache hit should still succeed.
        std::fs::remove_dir_all(&dir).ok();
        let second = cache.get("ETHUSD", Interval::OneDay).await.unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let dir = std::env::temp_dir().join(format!("evocrate-cache-test-ttl-{}", std::process::id()));
        write_csv(&dir, "SOLUSD", Interval::OneHour);

        let pool = memory_pool().await;
        let cache = MarketDataCache::with_ttl(MarketDataStore::new(pool.clone(), &dir), Duration::from_millis(1));
        let first = cache.get("SOLUSD", Interval::OneHour).await.unwrap();
        assert_eq!(first.len(), 1);
        std::thread::sleep(Duration::from_millis(5));

        // Insert a second bar directly into the db, bypassing the csv entirely, so the only
        // way `second` can see it is if the expired entry actually triggers a refetch.
        sqlx::query(
            "INSERT INTO market_data (exchange_id, symbol_id, timeframe, timestamp, open, high, low, close, volume) \
             SELECT exchange_id, symbol_id, timeframe, '2024-01-01T01:00:00Z', 103, 109, 101, 107, 13 \
             FROM market_data LIMIT 1",
        )
        .execute(&pool)
        .await
        .unwrap();

        let second = cache.get("SOLUSD", Interval::OneHour).await.unwrap();
        assert_eq!(second.len(), 2, "ttl expiry must refetch from the store rather than serve the stale entry");

        std::fs::remove_dir_all(&dir).ok();
    }
}
