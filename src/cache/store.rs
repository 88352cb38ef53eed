//! Cache Store Module
//!
//! In-process cache engine: an ordered map of keys to TTL-bound entries.
//!
//! Keys are kept in a `BTreeMap` so that every key sharing a prefix sits in
//! one contiguous range. Prefix invalidation is a range walk rather than a
//! scan of the whole map.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::Instant;

use crate::cache::{CacheEntry, CacheStats, MAX_KEY_LENGTH};
use crate::error::{CacheError, CacheResult};

// == Cache Store ==
/// Key-value storage with lazy TTL expiry.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Entries ordered by key
    entries: BTreeMap<String, CacheEntry>,
    /// Usage counters
    stats: CacheStats,
}

impl CacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl_seconds`.
    ///
    /// Overwriting an existing key replaces the value and resets its TTL.
    pub fn set(&mut self, key: &str, value: String, ttl_seconds: u64) -> CacheResult<()> {
        validate_key(key)?;

        self.entries
            .insert(key.to_string(), CacheEntry::new(key, value, ttl_seconds));
        self.stats.set_total_entries(self.entries.len());
        Ok(())
    }

    // == Get ==
    /// Returns the value stored under `key`, or `None` on a miss.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                Some(value)
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.record_expirations(1);
                self.stats.set_total_entries(self.entries.len());
                self.stats.record_miss();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Returns true if `key` holds a live entry. Does not touch hit/miss counters.
    pub fn has(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    // == Delete ==
    /// Removes `key`, returning whether anything was stored under it.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.stats.record_invalidations(1);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    // == Keys ==
    /// Lists every live key in ascending order.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect()
    }

    // == Delete Prefix ==
    /// Removes every key that starts with `prefix` and returns how many went.
    pub fn delete_prefix(&mut self, prefix: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            self.entries.remove(key);
        }

        self.stats.record_invalidations(doomed.len());
        self.stats.set_total_entries(self.entries.len());
        doomed.len()
    }

    // == Purge Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));

        let removed = before - self.entries.len();
        self.stats.record_expirations(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Number of stored entries, including ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
