//! Table Booking - reservation engine with a cache-aside read layer
//!
//! Reads are memoized in a shared TTL cache; writes run in a single data
//! store transaction and evict the affected cache entries after commit.

pub mod booking;
pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use booking::BookingTransactionManager;
pub use cache::SharedCache;
pub use config::Config;
pub use error::{BookingError, CacheError};
pub use tasks::spawn_sweep_task;
