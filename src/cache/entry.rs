//! Cache Entry Module
//!
//! Defines a single cached value and its expiry deadline.

use std::time::{Duration, Instant};

/// Longest lifetime an entry can get; larger TTLs are clamped to it.
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

// == Cache Entry ==
/// A serialized value held by the cache until `expires_at`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The key this entry is stored under
    pub key: String,
    /// Serialized value, opaque to the store
    pub value: String,
    /// When the entry was written
    pub created_at: Instant,
    /// Deadline after which the entry must be treated as absent
    pub expires_at: Instant,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry that expires `ttl_seconds` from now.
    ///
    /// # Arguments
    /// * `key` - The key the entry is stored under
    /// * `value` - Serialized value
    /// * `ttl_seconds` - Lifetime in seconds, capped at [`MAX_TTL_SECS`]
    pub fn new(key: impl Into<String>, value: String, ttl_seconds: u64) -> Self {
        let now = Instant::now();
        Self {
            key: key.into(),
            value,
            created_at: now,
            expires_at: deadline(now, ttl_seconds),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// `expires_at`, so a zero TTL is never readable.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Same as [`is_expired`](Self::is_expired) against a caller-supplied clock.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// `now + ttl_seconds`, clamped so the addition cannot overflow `Instant`.
fn deadline(now: Instant, ttl_seconds: u64) -> Instant {
    let ttl = Duration::from_secs(ttl_seconds.min(MAX_TTL_SECS));
    now.checked_add(ttl)
        .or_else(|| now.checked_add(Duration::from_secs(24 * 60 * 60)))
        .unwrap_or(now)
}
