//! Cache Module
//!
//! Shared TTL cache plus the cache-aside read wrapper and post-commit
//! invalidation wrapper used by the booking engine.

mod backend;
mod entry;
mod invalidate;
mod key;
mod memoize;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use backend::{CacheBackend, SharedCache};
pub use entry::{CacheEntry, MAX_TTL_SECS};
pub use invalidate::{Invalidation, Invalidator, InvalidatorBuilder, KeysFn};
pub use key::{CacheKey, KEY_VERSION};
pub use memoize::{
    BoundOperation, CachedOperation, CachedOperationBuilder, KeyFn, ReadFn, ReadFuture,
};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 512;

/// TTL applied by cached operations unless configured otherwise
pub const DEFAULT_TTL_SECS: u64 = 60;
