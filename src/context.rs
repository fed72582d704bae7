//! Shared application context (§9 Design Notes): the handles every long-lived task needs,
//! bundled so the HTTP surface and the autonomous evolution loop construct it once at
//! startup and clone the `Arc` around rather than threading five parameters everywhere.

use std::sync::Arc;

use crate::config::Config;
use crate::data::cache::MarketDataCache;
use crate::data::store::MarketDataStore;
use crate::error::Result;
use crate::persistence::Repository;

pub struct AppContext {
    pub config: Config,
    pub repository: Repository,
    pub market_data: MarketDataCache,
}

impl AppContext {
    pub async fn build(config: Config) -> Result<Arc<Self>> {
        let repository = Repository::connect(&config.db_path).await?;
        let market_data = MarketDataCache::new(MarketDataStore::new(repository.pool_handle(), &config.market_data_path));
        Ok(Arc::new(Self {
            config,
            repository,
            market_data,
        }))
    }
}
