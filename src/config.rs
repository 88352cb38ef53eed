//! Configuration Module
//!
//! Loads cache and booking settings from environment variables.

use std::env;

use crate::cache::DEFAULT_TTL_SECS;

/// Runtime settings. Every value has a default and can be overridden by env.
#[derive(Debug, Clone)]
pub struct Config {
    /// TTL in seconds for cached reads
    pub cache_ttl: u64,
    /// Interval in seconds between sweeps of expired cache entries
    pub sweep_interval: u64,
    /// Page size used when a search does not ask for one
    pub search_page_size: u32,
    /// Tables created in the in-memory store by the demo binary
    pub seed_tables: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL` - Cache TTL in seconds (default: 60)
    /// - `CACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 30)
    /// - `SEARCH_PAGE_SIZE` - Default search page size (default: 20)
    /// - `SEED_TABLES` - Demo table count (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl: env_or("CACHE_DEFAULT_TTL", defaults.cache_ttl),
            sweep_interval: env_or("CACHE_SWEEP_INTERVAL", defaults.sweep_interval),
            search_page_size: env_or("SEARCH_PAGE_SIZE", defaults.search_page_size),
            seed_tables: env_or("SEED_TABLES", defaults.seed_tables),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL_SECS,
            sweep_interval: 30,
            search_page_size: 20,
            seed_tables: 10,
        }
    }
}
