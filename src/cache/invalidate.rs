//! Invalidator Module
//!
//! Post-success cache eviction around write operations.
//!
//! An [`Invalidator`] carries an ordered list of strategies. After the
//! wrapped write returns `Ok`, each strategy runs once in the order it was
//! added. A failed write evicts nothing.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::CacheBackend;
use crate::error::{CacheError, CacheResult};

/// Produces the exact keys a write makes stale.
pub type KeysFn<A> = Arc<dyn Fn(&A) -> CacheResult<Vec<String>> + Send + Sync>;

// == Strategy ==
pub enum Invalidation<A> {
    /// Delete each key returned by the generator.
    ByKeys(KeysFn<A>),
    /// Delete every key starting with the prefix.
    ByPrefix(String),
}

impl<A> std::fmt::Debug for Invalidation<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invalidation::ByKeys(_) => f.write_str("ByKeys(..)"),
            Invalidation::ByPrefix(prefix) => write!(f, "ByPrefix({:?})", prefix),
        }
    }
}

// == Invalidator ==
pub struct Invalidator<A> {
    name: String,
    cache: Arc<dyn CacheBackend>,
    strategies: Vec<Invalidation<A>>,
}

impl<A> Invalidator<A> {
    pub fn builder(name: impl Into<String>) -> InvalidatorBuilder<A> {
        InvalidatorBuilder {
            name: name.into(),
            cache: None,
            strategies: Vec::new(),
        }
    }

    pub fn strategies(&self) -> &[Invalidation<A>] {
        &self.strategies
    }

    // == Wrap ==
    /// Runs `write` once, then evicts if it succeeded.
    ///
    /// Eviction has finished by the time this returns.
    pub async fn wrap<F, Fut, T, E>(&self, args: &A, write: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let output = write().await?;
        self.invalidate(args).await;
        Ok(output)
    }

    // == Invalidate ==
    /// Applies every strategy for `args` and returns the number of entries removed.
    ///
    /// Backend errors are logged; the remaining strategies still run.
    pub async fn invalidate(&self, args: &A) -> usize {
        let mut removed = 0;

        for strategy in &self.strategies {
            match strategy {
                Invalidation::ByKeys(keys_fn) => {
                    let keys = match keys_fn(args) {
                        Ok(keys) => keys,
                        Err(err) => {
                            warn!(invalidator = %self.name, error = %err, "could not derive keys to invalidate");
                            continue;
                        }
                    };
                    for key in keys {
                        match self.cache.delete(&key).await {
                            Ok(true) => removed += 1,
                            Ok(false) => {}
                            Err(err) => {
                                warn!(invalidator = %self.name, key = %key, error = %err, "cache delete failed")
                            }
                        }
                    }
                }
                Invalidation::ByPrefix(prefix) => match self.cache.delete_prefix(prefix).await {
                    Ok(count) => removed += count,
                    Err(err) => {
                        warn!(invalidator = %self.name, prefix = %prefix, error = %err, "prefix invalidation failed")
                    }
                },
            }
        }

        debug!(invalidator = %self.name, removed, "cache invalidated");
        removed
    }
}

// == Builder ==
pub struct InvalidatorBuilder<A> {
    name: String,
    cache: Option<Arc<dyn CacheBackend>>,
    strategies: Vec<Invalidation<A>>,
}

impl<A> InvalidatorBuilder<A> {
    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn by_keys<F>(mut self, keys_fn: F) -> Self
    where
        F: Fn(&A) -> CacheResult<Vec<String>> + Send + Sync + 'static,
    {
        self.strategies.push(Invalidation::ByKeys(Arc::new(keys_fn)));
        self
    }

    pub fn by_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strategies.push(Invalidation::ByPrefix(prefix.into()));
        self
    }

    /// Fails with [`CacheError::Config`] without a cache handle or without strategies.
    pub fn build(self) -> CacheResult<Invalidator<A>> {
        let cache = self.cache.ok_or_else(|| {
            CacheError::Config(format!(
                "invalidator '{}' was built without a cache handle",
                self.name
            ))
        })?;

        if self.strategies.is_empty() {
            return Err(CacheError::Config(format!(
                "invalidator '{}' has no invalidation strategy",
                self.name
            )));
        }

        Ok(Invalidator {
            name: self.name,
            cache,
            strategies: self.strategies,
        })
    }
}
