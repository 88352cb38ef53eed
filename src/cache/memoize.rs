//! Memoizer Module
//!
//! Cache-aside wrapper for read operations.
//!
//! A [`CachedOperation`] pairs an operation name with a key generator, a TTL
//! and a cache handle. Calling it with the arguments and the underlying read
//! consults the cache first and only runs the read on a miss.
//!
//! # Example
//! ```ignore
//! let by_id = CachedOperation::<u64, Reservation>::builder("reservation_by_id")
//!     .cache(cache.backend())
//!     .ttl(60)
//!     .build()?;
//!
//! let reservation = by_id.call(&id, || store.load(id)).await?;
//! ```
//!
//! [`CachedOperation::bind`] fixes the read at construction time instead, so
//! callers pass only the arguments:
//!
//! ```ignore
//! let by_id = by_id.bind(move |id| load(store.clone(), id));
//! let reservation = by_id.get(&id).await?;
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheBackend, CacheKey, DEFAULT_TTL_SECS};
use crate::error::{CacheError, CacheResult};

/// Turns call arguments into a cache key.
pub type KeyFn<A> = Arc<dyn Fn(&A) -> CacheResult<String> + Send + Sync>;

/// Boxed future returned by a bound read.
pub type ReadFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Underlying read bound into a [`BoundOperation`].
pub type ReadFn<A, T, E> = Arc<dyn Fn(A) -> ReadFuture<T, E> + Send + Sync>;

// == Cached Operation ==
/// A read operation routed through the shared cache.
///
/// Concurrent misses on the same key are not coalesced: each caller runs the
/// read and writes the cache, and the last write wins.
pub struct CachedOperation<A, T> {
    name: String,
    cache: Arc<dyn CacheBackend>,
    ttl_seconds: u64,
    key_fn: KeyFn<A>,
    _result: PhantomData<fn() -> T>,
}

impl<A, T> CachedOperation<A, T>
where
    A: Serialize + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Send,
{
    pub fn builder(name: impl Into<String>) -> CachedOperationBuilder<A, T> {
        CachedOperationBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Key this operation uses for `args`.
    pub fn key_for(&self, args: &A) -> CacheResult<String> {
        (self.key_fn)(args)
    }

    /// Prefix shared by every key this operation writes with the default key generator.
    pub fn prefix(&self) -> String {
        CacheKey::prefix(&self.name)
    }

    // == Call ==
    /// Returns the cached result for `args`, or runs `read` and caches its result.
    ///
    /// Errors from `read` propagate and leave the cache untouched. Cache
    /// failures are logged and never surface.
    pub async fn call<F, Fut, E>(&self, args: &A, read: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = match self.key_for(args) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(operation = %self.name, error = %err, "cache key generation failed, bypassing cache");
                None
            }
        };

        if let Some(key) = key.as_deref() {
            if let Some(hit) = self.lookup(key).await {
                return Ok(hit);
            }
        }

        let value = read().await?;

        if let Some(key) = key.as_deref() {
            self.populate(key, &value).await;
        }

        Ok(value)
    }

    async fn lookup(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, "cache hit");
                    Some(value)
                }
                Err(err) => {
                    warn!(key, error = %err, "undecodable cache entry, treating as miss");
                    None
                }
            },
            Ok(None) => {
                debug!(key, "cache miss");
                None
            }
            Err(err) => {
                warn!(key, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn populate(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "result not serializable, skipping cache write");
                return;
            }
        };

        if let Err(err) = self.cache.set(key, raw, self.ttl_seconds).await {
            warn!(key, error = %err, "cache write failed");
        }
    }
}

impl<A, T> CachedOperation<A, T>
where
    A: Serialize + Clone + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Composes this operation with the read it caches.
    ///
    /// # Arguments
    /// * `read` - Plain async function producing the value for one argument set
    ///
    /// # Returns
    /// A [`BoundOperation`] whose [`get`](BoundOperation::get) only needs the arguments.
    pub fn bind<F, Fut, E>(self, read: F) -> BoundOperation<A, T, E>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: 'static,
    {
        let read: ReadFn<A, T, E> = Arc::new(move |args: A| -> ReadFuture<T, E> {
            Box::pin(read(args))
        });
        BoundOperation {
            operation: self,
            read,
        }
    }
}

// == Bound Operation ==
/// A [`CachedOperation`] together with the read it wraps.
pub struct BoundOperation<A, T, E> {
    operation: CachedOperation<A, T>,
    read: ReadFn<A, T, E>,
}

impl<A, T, E> BoundOperation<A, T, E>
where
    A: Serialize + Clone + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn operation(&self) -> &CachedOperation<A, T> {
        &self.operation
    }

    /// Returns the cached result for `args`, running the bound read on a miss.
    pub async fn get(&self, args: &A) -> Result<T, E> {
        self.operation
            .call(args, || (self.read)(args.clone()))
            .await
    }
}

// == Builder ==
pub struct CachedOperationBuilder<A, T> {
    name: String,
    cache: Option<Arc<dyn CacheBackend>>,
    ttl_seconds: u64,
    key_fn: Option<KeyFn<A>>,
    _result: PhantomData<fn() -> T>,
}

impl<A, T> CachedOperationBuilder<A, T>
where
    A: Serialize + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Send,
{
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache: None,
            ttl_seconds: DEFAULT_TTL_SECS,
            key_fn: None,
            _result: PhantomData,
        }
    }

    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Replaces the default `CacheKey::build(name, args)` generator.
    pub fn key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&A) -> CacheResult<String> + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    /// Fails with [`CacheError::Config`] when no cache handle was supplied.
    pub fn build(self) -> CacheResult<CachedOperation<A, T>> {
        let cache = self.cache.ok_or_else(|| {
            CacheError::Config(format!(
                "cached operation '{}' was built without a cache handle",
                self.name
            ))
        })?;

        let key_fn = match self.key_fn {
            Some(key_fn) => key_fn,
            None => {
                let name = self.name.clone();
                Arc::new(move |args: &A| CacheKey::build(&name, args)) as KeyFn<A>
            }
        };

        Ok(CachedOperation {
            name: self.name,
            cache,
            ttl_seconds: self.ttl_seconds,
            key_fn,
            _result: PhantomData,
        })
    }
}
