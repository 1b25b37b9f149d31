use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::browser::{SystemOpener, UrlOpener};
use crate::cache::PostCache;
use crate::config::Config;
use crate::db::Database;
use crate::fetcher::Fetcher;
use crate::scheduler::{Clock, SystemClock};

/// Everything a command handler may touch during one invocation.
pub struct AppState {
    pub db: Database,
    pub config: RwLock<Config>,
    pub config_path: PathBuf,
    pub fetcher: Fetcher,
    pub cache: PostCache,
    pub opener: Box<dyn UrlOpener>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(db: Database, config: Config, config_path: PathBuf, fetcher: Fetcher) -> Self {
        Self {
            db,
            config: RwLock::new(config),
            config_path,
            fetcher,
            cache: PostCache::new(PostCache::default_path()),
            opener: Box::new(SystemOpener),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_cache(mut self, cache: PostCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_opener(mut self, opener: Box<dyn UrlOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
