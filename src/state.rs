use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::feed::{FeedService, PageCache};
use crate::store::{ContentStore, SqliteContentStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub store: Arc<dyn ContentStore>,
    pub feed: FeedService,
}

impl AppState {
    /// Wire the SQLite store, page cache and feed service from configuration.
    pub fn new(db: DbPool, config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn ContentStore> = Arc::new(SqliteContentStore::new(db.clone()));
        let cache = PageCache::new(config.cache.ttl());
        let feed = FeedService::new(store.clone(), cache, config.page_size()?);

        Ok(Self {
            db,
            config,
            store,
            feed,
        })
    }
}
