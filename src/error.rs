//! Error types for the booking engine and its cache layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Booking Error Enum ==
/// Errors surfaced to callers of the booking engine.
///
/// Cache failures never appear here: they degrade to a miss or a no-op
/// inside the cache layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Request references data that does not exist (unknown table ids)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Reservation not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Data store or transport failure; the transaction was rolled back
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Shorthand for a missing reservation.
    pub fn reservation_not_found(id: u64) -> Self {
        BookingError::NotFound(format!("reservation {} does not exist", id))
    }
}

// == Cache Error Enum ==
/// Errors raised by cache backends and cache wrappers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key is empty or exceeds the maximum length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Value or arguments could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend could not be reached
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// Wrapper was built without the pieces it needs
    #[error("Cache configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for booking operations.
pub type Result<T> = std::result::Result<T, BookingError>;

/// Result type for cache backend calls.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
