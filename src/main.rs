//! Table Booking - demo runner
//!
//! Wires the shared cache, an in-memory data store and the booking manager,
//! then books two overlapping reservations on one table and prints both
//! outcomes as JSON.

use std::sync::Arc;

use anyhow::Context;
use chrono::{TimeZone, Utc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use table_booking::booking::{ContactInfo, InMemoryStore, NewReservation, Table};
use table_booking::{spawn_sweep_task, BookingTransactionManager, Config, SharedCache};

/// Entry point for the booking demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the shared cache and seed the data store with tables
/// 4. Start the background cache sweep
/// 5. Book two reservations on table 5, one hour apart
/// 6. Print both outcomes and stop the sweep
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" for this crate, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "table_booking=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting table booking demo");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_ttl={}s, sweep_interval={}s, page_size={}, tables={}",
        config.cache_ttl, config.sweep_interval, config.search_page_size, config.seed_tables
    );

    let cache = SharedCache::new();
    let store = InMemoryStore::with_tables(
        (1..=config.seed_tables).map(|id| Table::new(id, id as u32, 4)),
    );
    let manager = BookingTransactionManager::from_config(Arc::new(store), cache.backend(), &config)
        .context("failed to build booking manager")?;

    let sweep_handle = spawn_sweep_task(cache.clone(), config.sweep_interval);
    info!("Background cache sweep started");

    let evening = Utc
        .with_ymd_and_hms(2024, 6, 1, 18, 0, 0)
        .single()
        .context("invalid demo start time")?;

    let first = manager
        .create_reservation(NewReservation::new(
            evening,
            4,
            [5],
            ContactInfo::named("Ada Lovelace"),
        ))
        .await?;
    println!("{}", serde_json::to_string_pretty(&first)?);

    let second = manager
        .create_reservation(NewReservation::new(
            evening - chrono::Duration::hours(1),
            2,
            [5],
            ContactInfo::named("Alan Turing"),
        ))
        .await?;
    println!("{}", serde_json::to_string_pretty(&second)?);

    if !second.conflicts.is_empty() {
        warn!(
            reservation_id = second.reservation.id,
            conflicts = second.conflicts.len(),
            "reservation overlaps an existing booking"
        );
    }

    // Served from cache on the second read
    let reread = manager.get_by_id(first.reservation.id).await?;
    manager.get_by_id(reread.id).await?;
    let stats = cache.stats().await;
    info!(
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.total_entries,
        "cache stats"
    );

    sweep_handle.abort();
    warn!("Cache sweep aborted");

    Ok(())
}
