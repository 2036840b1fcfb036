//! Caching is a reader-implementation concern, not a format concern: this
//! module wraps any [`ByteSource`] with an LRU cache of recently fetched
//! byte ranges, keyed by `(offset, length)`.

use std::num::NonZeroUsize;
use std::sync::RwLock;

use lru::LruCache;

use crate::reader::ByteSource;
use crate::SwTilesError;

/// Default number of distinct fetches a [`CachingByteSource`] retains.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Wraps a [`ByteSource`] with an LRU cache of `(offset, length) -> bytes`.
///
/// A reader-writer lock guards the map; no lock is held across the
/// underlying fetch, so a cache miss on one call never blocks a concurrent
/// hit on another key.
pub struct CachingByteSource<S> {
    inner: S,
    cache: RwLock<LruCache<(u64, u64), Vec<u8>>>,
}

impl<S: ByteSource> CachingByteSource<S> {
    /// Wraps `inner`, caching up to `capacity` distinct `(offset, length)` fetches.
    pub fn new(inner: S, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Wraps `inner` with [`DEFAULT_CACHE_CAPACITY`] entries.
    pub fn with_default_capacity(inner: S) -> Self {
        let capacity =
            NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).expect("DEFAULT_CACHE_CAPACITY is nonzero");
        Self::new(inner, capacity)
    }
}

impl<S: ByteSource> ByteSource for CachingByteSource<S> {
    fn fetch(&self, offset: u64, length: u64) -> Result<Vec<u8>, SwTilesError> {
        let key = (offset, length);

        let poisoned = |_| SwTilesError::FetchFailed {
            offset,
            length,
            reason: "cache lock poisoned".to_string(),
        };

        if let Some(hit) = self.cache.write().map_err(poisoned)?.get(&key).cloned() {
            tracing::trace!(offset, length, "cache hit");
            return Ok(hit);
        }

        tracing::trace!(offset, length, "cache miss");
        let bytes = self.inner.fetch(offset, length)?;

        self.cache.write().map_err(poisoned)?.put(key, bytes.clone());

        Ok(bytes)
    }
}
