//! Read-through cache for card images.
//!
//! Bounded to the catalog size, so nothing is ever evicted in practice; the
//! cap just keeps the cache from growing past the deck.

use crate::catalog;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unknown card: {0}")]
    UnknownCard(String),

    #[error("failed to read card image {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct CardImageCache {
    dir: PathBuf,
    cache: Arc<Mutex<LruCache<String, Arc<Vec<u8>>>>>,
}

impl CardImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let capacity = NonZeroUsize::new(catalog::size()).unwrap_or(NonZeroUsize::MIN);
        Self {
            dir: dir.into(),
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Image bytes for a card, populating the cache on first access.
    pub async fn get(&self, card_name: &str) -> Result<Arc<Vec<u8>>, ImageError> {
        let file = catalog::lookup(card_name)
            .ok_or_else(|| ImageError::UnknownCard(card_name.to_string()))?;

        {
            let mut cache = self.cache.lock().await;
            if let Some(bytes) = cache.get(card_name) {
                return Ok(Arc::clone(bytes));
            }
        }

        let path = self.dir.join(file);
        let bytes = tokio::fs::read(&path)
            .await
            .map(Arc::new)
            .map_err(|source| ImageError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("Loaded card image {} ({} bytes)", path.display(), bytes.len());

        let mut cache = self.cache.lock().await;
        cache.put(card_name.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }
}
