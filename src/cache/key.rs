//! Cache Key Module
//!
//! Canonical cache keys built from an operation name and its arguments.
//!
//! Format: `v1:<operation>_<json>` where `<json>` is the arguments encoded
//! through `serde_json::Value`. Object fields come out sorted, so two equal
//! argument values always produce the same key, in any process.

use serde::Serialize;

use crate::error::CacheResult;

/// Bumped whenever the key layout or cached value shapes change.
pub const KEY_VERSION: &str = "v1";

// == Cache Key ==
/// Builder for canonical keys.
#[derive(Debug, Clone, Copy)]
pub struct CacheKey;

impl CacheKey {
    /// Builds the key for `operation` called with `args`.
    pub fn build<A: Serialize + ?Sized>(operation: &str, args: &A) -> CacheResult<String> {
        let canonical = serde_json::to_value(args)?;
        Ok(format!(
            "{}{}",
            Self::prefix(operation),
            serde_json::to_string(&canonical)?
        ))
    }

    /// Prefix shared by every key of `operation`.
    pub fn prefix(operation: &str) -> String {
        format!("{}:{}_", KEY_VERSION, operation)
    }
}
