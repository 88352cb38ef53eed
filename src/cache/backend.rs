//! Cache Backend Module
//!
//! The async seam every cache consumer talks to, and the in-process
//! implementation backed by [`CacheStore`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheStats, CacheStore};
use crate::error::CacheResult;

// == Cache Backend ==
/// Operations the memoizer and invalidator need from a cache.
///
/// Every call is a potential suspension point so that a remote cache can sit
/// behind the same trait. Callers treat any `Err` as a miss (reads) or a
/// no-op (evictions).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the live value under `key`, if any.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores `value` under `key` for `ttl_seconds`.
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> CacheResult<()>;

    /// Removes `key`. Returns whether an entry was present.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Lists live keys.
    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Returns whether `key` holds a live entry.
    async fn has(&self, key: &str) -> CacheResult<bool>;

    /// Removes every key starting with `prefix`.
    ///
    /// The default walks [`keys`](Self::keys); backends with an ordered
    /// keyspace should override it.
    async fn delete_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let mut removed = 0;
        for key in self.keys().await? {
            if key.starts_with(prefix) && self.delete(&key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// == Shared Cache ==
/// Cloneable handle to one process-wide [`CacheStore`].
///
/// Construct it once and pass clones to every component that caches.
#[derive(Debug, Clone, Default)]
pub struct SharedCache {
    inner: Arc<RwLock<CacheStore>>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the handle as a trait object for injection.
    pub fn backend(&self) -> Arc<dyn CacheBackend> {
        Arc::new(self.clone())
    }

    /// Removes expired entries, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        self.inner.write().await.purge_expired()
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.read().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for SharedCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        // Write lock: an expired hit is removed and counters change.
        Ok(self.inner.write().await.get(key))
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> CacheResult<()> {
        self.inner.write().await.set(key, value, ttl_seconds)
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.inner.write().await.delete(key))
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.inner.read().await.keys())
    }

    async fn has(&self, key: &str) -> CacheResult<bool> {
        Ok(self.inner.read().await.has(key))
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<usize> {
        Ok(self.inner.write().await.delete_prefix(prefix))
    }
}
