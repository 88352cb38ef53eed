//! Cache Sweep Task
//!
//! Reads already ignore expired entries; the sweep keeps them from piling up
//! in memory when nobody reads them again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a task that purges expired entries every `interval_secs` seconds.
///
/// Returns the task handle so the caller can abort it on shutdown.
///
/// # Example
/// ```ignore
/// let cache = SharedCache::new();
/// let sweeper = spawn_sweep_task(cache.clone(), 30);
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_sweep_task(cache: SharedCache, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "cache sweep task started");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired().await;
            if removed > 0 {
                info!(removed, "cache sweep purged expired entries");
            } else {
                debug!("cache sweep found nothing to purge");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheBackend;

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let cache = SharedCache::new();
        cache
            .set("expire_soon", "value".to_string(), 1)
            .await
            .unwrap();

        let handle = spawn_sweep_task(cache.clone(), 1);

        // Entry expires at 1s, the sweep runs at 1s and 2s.
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(cache.len().await, 0, "Expired entry should have been purged");
        assert_eq!(cache.stats().await.expirations, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_preserves_live_entries() {
        let cache = SharedCache::new();
        cache
            .set("long_lived", "value".to_string(), 3600)
            .await
            .unwrap();

        let handle = spawn_sweep_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(
            cache.get("long_lived").await.unwrap(),
            Some("value".to_string())
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_can_be_aborted() {
        let handle = spawn_sweep_task(SharedCache::new(), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
