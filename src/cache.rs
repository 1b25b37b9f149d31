use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::PostWithFeed;

const CACHE_FILE_NAME: &str = "gator_posts_cache.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("No cached posts found. Run 'browse' first.")]
    Unavailable,
    #[error("The last browse returned no posts. Run 'browse' again.")]
    Empty,
    #[error("Invalid post index {index}. Use a number between 0 and {max}.")]
    InvalidIndex { index: i64, max: usize },
    #[error("Failed to write post cache: {0}")]
    Write(#[from] std::io::Error),
    #[error("Failed to encode post cache: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedPost {
    pub url: String,
    pub feed_name: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

impl From<&PostWithFeed> for CachedPost {
    fn from(post: &PostWithFeed) -> Self {
        Self {
            url: post.url.clone(),
            feed_name: post.feed_name.clone(),
            title: post.title.clone(),
            published_at: post.published_at,
        }
    }
}

/// The result of the most recent `browse`, kept on disk between invocations.
#[derive(Debug, Clone)]
pub struct PostCache {
    path: PathBuf,
}

impl PostCache {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(CACHE_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the cache with `entries`.
    pub fn save(&self, entries: &[CachedPost]) -> Result<(), CacheError> {
        let data = serde_json::to_vec_pretty(entries)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<CachedPost>, CacheError> {
        let data = std::fs::read(&self.path).map_err(|_| CacheError::Unavailable)?;
        serde_json::from_slice(&data).map_err(|_| CacheError::Unavailable)
    }

    /// URL of the post shown at `index` by the last browse.
    pub fn resolve(&self, index: i64) -> Result<String, CacheError> {
        let entries = self.load()?;
        if entries.is_empty() {
            return Err(CacheError::Empty);
        }

        let max = entries.len() - 1;
        usize::try_from(index)
            .ok()
            .and_then(|i| entries.get(i))
            .map(|entry| entry.url.clone())
            .ok_or(CacheError::InvalidIndex { index, max })
    }
}
