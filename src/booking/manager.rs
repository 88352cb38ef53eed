//! Booking transaction manager
//!
//! Runs every reservation operation inside one data store transaction.
//! Reads go through cached operations; writes evict the affected cache
//! entries after their transaction commits and before they return.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::booking::conflict::check_conflicts;
use crate::booking::model::{
    BookingOutcome, GuestInfo, NewReservation, Page, Reservation, ReservationId,
    ReservationPatch, ReservationStatus, SearchCriteria, Table, TableId,
};
use crate::booking::store::{DataStore, Transaction};
use crate::cache::{
    BoundOperation, CacheBackend, CacheKey, CachedOperation, Invalidator, DEFAULT_TTL_SECS,
};
use crate::config::Config;
use crate::error::{BookingError, CacheResult, Result};

// == Cache Key Namespaces ==
pub const RESERVATION_BY_ID_OP: &str = "reservation_by_id";
pub const RESERVATION_SEARCH_OP: &str = "reservation_search";
pub const TABLE_LIST_OP: &str = "table_list";

/// Key under which `get_by_id(id)` is cached.
pub fn reservation_cache_key(id: ReservationId) -> CacheResult<String> {
    CacheKey::build(RESERVATION_BY_ID_OP, &id)
}

/// Prefix shared by every cached search result.
pub fn reservation_search_prefix() -> String {
    CacheKey::prefix(RESERVATION_SEARCH_OP)
}

/// Checks that every id in `table_ids` names an existing table.
///
/// # Arguments
/// * `tx` - Transaction the lookup runs in
/// * `table_ids` - Ids to check; an empty set passes
///
/// # Returns
/// - `Ok(())` if every table exists
/// - `Err(BookingError::Validation)` listing the unknown ids otherwise
pub async fn validate_tables(
    tx: &mut dyn Transaction,
    table_ids: &BTreeSet<TableId>,
) -> Result<()> {
    if table_ids.is_empty() {
        return Ok(());
    }

    let found: BTreeSet<TableId> = tx
        .find_tables(table_ids)
        .await?
        .into_iter()
        .map(|table| table.id)
        .collect();
    let missing: Vec<TableId> = table_ids.difference(&found).copied().collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BookingError::Validation(format!(
            "unknown table ids: {:?}",
            missing
        )))
    }
}

// == Manager ==
pub struct BookingTransactionManager {
    store: Arc<dyn DataStore>,
    by_id: BoundOperation<ReservationId, Reservation, BookingError>,
    search: BoundOperation<SearchCriteria, Page<Reservation>, BookingError>,
    tables: BoundOperation<(), Vec<Table>, BookingError>,
    invalidator: Invalidator<ReservationId>,
    default_page_size: u32,
}

impl BookingTransactionManager {
    pub fn builder(store: Arc<dyn DataStore>) -> BookingManagerBuilder {
        BookingManagerBuilder {
            store,
            cache: None,
            ttl_seconds: DEFAULT_TTL_SECS,
            default_page_size: Config::default().search_page_size,
        }
    }

    /// Builds a manager with the TTL and page size from `config`.
    ///
    /// # Arguments
    /// * `store` - Data store every operation runs against
    /// * `cache` - Shared cache handle for reads and invalidation
    /// * `config` - Source of `cache_ttl` and `search_page_size`
    pub fn from_config(
        store: Arc<dyn DataStore>,
        cache: Arc<dyn CacheBackend>,
        config: &Config,
    ) -> CacheResult<Self> {
        Self::builder(store)
            .cache(cache)
            .ttl(config.cache_ttl)
            .page_size(config.search_page_size)
            .build()
    }

    // == Reads ==
    /// Returns the reservation, from cache when possible.
    ///
    /// # Arguments
    /// * `id` - Reservation to load
    ///
    /// # Returns
    /// - `Ok(reservation)` from the cache or the data store
    /// - `Err(BookingError::NotFound)` if no such reservation exists (never cached)
    pub async fn get_by_id(&self, id: ReservationId) -> Result<Reservation> {
        self.by_id.get(&id).await
    }

    /// Returns one page of reservations matching `criteria`.
    ///
    /// Criteria are normalized first so that equivalent searches share a
    /// cache entry. Every reservation write evicts all cached pages.
    pub async fn search(&self, criteria: SearchCriteria) -> Result<Page<Reservation>> {
        let criteria = criteria.normalized(self.default_page_size);
        self.search.get(&criteria).await
    }

    /// Returns every table. Reservation writes never evict this entry.
    pub async fn list_tables(&self) -> Result<Vec<Table>> {
        self.tables.get(&()).await
    }

    // == Create ==
    /// Creates a reservation and reports conflicting bookings on its tables.
    ///
    /// Tables are validated, the row is inserted and conflicts are computed in
    /// one transaction. Cached searches are evicted after the commit.
    ///
    /// # Arguments
    /// * `input` - The reservation to create
    ///
    /// # Returns
    /// - `Ok(outcome)` with the stored row and any advisory conflicts
    /// - `Err(BookingError::Validation)` if a table id is unknown; nothing is written
    /// - `Err(BookingError::Internal)` if the commit fails; nothing is written
    pub async fn create_reservation(&self, input: NewReservation) -> Result<BookingOutcome> {
        let mut tx = self.store.begin().await?;

        validate_tables(tx.as_mut(), &input.tables).await?;
        let reservation = tx.insert_reservation(input).await?;

        let candidates = tx.reservations_on_tables(&reservation.tables).await?;
        let conflicts = check_conflicts(
            &candidates,
            &reservation.tables,
            reservation.time,
            Some(reservation.id),
        );

        tx.commit().await?;
        self.invalidator.invalidate(&reservation.id).await;

        info!(
            reservation_id = reservation.id,
            conflicts = conflicts.len(),
            "reservation created"
        );
        Ok(BookingOutcome {
            reservation,
            conflicts,
        })
    }

    // == Updates ==
    /// Applies `patch` and re-checks conflicts when it replaces the tables.
    ///
    /// # Arguments
    /// * `id` - Reservation to change
    /// * `patch` - Fields to overwrite; absent fields are left alone
    pub async fn update(&self, id: ReservationId, patch: ReservationPatch) -> Result<BookingOutcome> {
        self.perform_update(id, patch, true).await
    }

    /// Sets the status; `is_active` follows it.
    pub async fn update_status(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<BookingOutcome> {
        let patch = ReservationPatch {
            status: Some(status),
            ..Default::default()
        };
        self.perform_update(id, patch, false).await
    }

    pub async fn update_time(&self, id: ReservationId, time: DateTime<Utc>) -> Result<BookingOutcome> {
        let patch = ReservationPatch {
            time: Some(time),
            ..Default::default()
        };
        self.perform_update(id, patch, true).await
    }

    pub async fn update_tables(
        &self,
        id: ReservationId,
        table_ids: impl IntoIterator<Item = TableId>,
    ) -> Result<BookingOutcome> {
        let patch = ReservationPatch {
            tables: Some(table_ids.into_iter().collect()),
            ..Default::default()
        };
        self.perform_update(id, patch, true).await
    }

    pub async fn update_guest_info(&self, id: ReservationId, info: GuestInfo) -> Result<BookingOutcome> {
        let patch = ReservationPatch {
            guests_count: info.guests_count,
            contact: info.contact,
            ..Default::default()
        };
        self.perform_update(id, patch, false).await
    }

    pub async fn update_comment(
        &self,
        id: ReservationId,
        comment: impl Into<String>,
    ) -> Result<BookingOutcome> {
        let patch = ReservationPatch {
            comments: Some(comment.into()),
            ..Default::default()
        };
        self.perform_update(id, patch, false).await
    }

    pub async fn update_allergies(
        &self,
        id: ReservationId,
        allergies: impl Into<String>,
    ) -> Result<BookingOutcome> {
        let patch = ReservationPatch {
            allergies: Some(allergies.into()),
            ..Default::default()
        };
        self.perform_update(id, patch, false).await
    }

    /// Shared body of every update.
    ///
    /// Conflicts are computed only when `check_conflicts_flag` is set and the
    /// patch replaces the table set; the reservation itself is excluded.
    ///
    /// # Arguments
    /// * `id` - Reservation to change
    /// * `patch` - Fields to overwrite; `tables` replaces the whole set
    /// * `check_conflicts_flag` - Whether a table replacement is re-checked
    ///
    /// # Returns
    /// - `Ok(outcome)` once the change is committed and the cache evicted
    /// - `Err(BookingError::NotFound)` if the reservation does not exist
    /// - `Err(BookingError::Validation)` if a replacement table id is unknown
    pub async fn perform_update(
        &self,
        id: ReservationId,
        patch: ReservationPatch,
        check_conflicts_flag: bool,
    ) -> Result<BookingOutcome> {
        let outcome = self
            .invalidator
            .wrap(&id, || async move {
                let mut tx = self.store.begin().await?;
                let mut reservation = tx
                    .get_reservation(id)
                    .await?
                    .ok_or_else(|| BookingError::reservation_not_found(id))?;

                let tables_replaced = match &patch.tables {
                    Some(tables) => {
                        validate_tables(tx.as_mut(), tables).await?;
                        true
                    }
                    None => false,
                };

                patch.apply(&mut reservation, Utc::now());
                tx.save_reservation(&reservation).await?;

                let conflicts = if check_conflicts_flag && tables_replaced {
                    let candidates = tx.reservations_on_tables(&reservation.tables).await?;
                    check_conflicts(&candidates, &reservation.tables, reservation.time, Some(id))
                } else {
                    Vec::new()
                };

                tx.commit().await?;
                Ok::<_, BookingError>(BookingOutcome {
                    reservation,
                    conflicts,
                })
            })
            .await?;

        info!(
            reservation_id = id,
            conflicts = outcome.conflicts.len(),
            "reservation updated"
        );
        Ok(outcome)
    }

    // == Delete ==
    /// Deletes the reservation and its table associations, whatever its status.
    ///
    /// # Returns
    /// - `Ok(())` once the row is gone and its cache entries evicted
    /// - `Err(BookingError::NotFound)` if the reservation does not exist
    pub async fn delete_reservation(&self, id: ReservationId) -> Result<()> {
        self.invalidator
            .wrap(&id, || async move {
                let mut tx = self.store.begin().await?;
                if !tx.delete_reservation(id).await? {
                    return Err(BookingError::reservation_not_found(id));
                }
                tx.commit().await
            })
            .await?;

        info!(reservation_id = id, "reservation deleted");
        Ok(())
    }
}

// == Builder ==
pub struct BookingManagerBuilder {
    store: Arc<dyn DataStore>,
    cache: Option<Arc<dyn CacheBackend>>,
    ttl_seconds: u64,
    default_page_size: u32,
}

impl BookingManagerBuilder {
    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size;
        self
    }

    /// Wires the cached reads and the invalidator.
    ///
    /// Fails with `CacheError::Config` when no cache handle was given.
    pub fn build(self) -> CacheResult<BookingTransactionManager> {
        let mut by_id = CachedOperation::<ReservationId, Reservation>::builder(RESERVATION_BY_ID_OP)
            .ttl(self.ttl_seconds)
            .key_fn(|id: &ReservationId| reservation_cache_key(*id));
        let mut search =
            CachedOperation::<SearchCriteria, Page<Reservation>>::builder(RESERVATION_SEARCH_OP)
                .ttl(self.ttl_seconds);
        let mut tables =
            CachedOperation::<(), Vec<Table>>::builder(TABLE_LIST_OP).ttl(self.ttl_seconds);
        let mut invalidator = Invalidator::<ReservationId>::builder("reservations")
            .by_keys(|id: &ReservationId| Ok(vec![reservation_cache_key(*id)?]))
            .by_prefix(reservation_search_prefix());

        if let Some(cache) = self.cache {
            by_id = by_id.cache(cache.clone());
            search = search.cache(cache.clone());
            tables = tables.cache(cache.clone());
            invalidator = invalidator.cache(cache);
        }

        let store = self.store.clone();
        let by_id = by_id.build()?.bind(move |id: ReservationId| {
            let store = store.clone();
            async move {
                let mut tx = store.begin().await?;
                tx.get_reservation(id)
                    .await?
                    .ok_or_else(|| BookingError::reservation_not_found(id))
            }
        });

        let store = self.store.clone();
        let search = search.build()?.bind(move |criteria: SearchCriteria| {
            let store = store.clone();
            async move {
                let mut tx = store.begin().await?;
                let (items, total) = tx.search_reservations(&criteria).await?;
                Ok::<_, BookingError>(Page::new(
                    items,
                    total,
                    criteria.page(),
                    criteria.page_size(),
                ))
            }
        });

        let store = self.store.clone();
        let tables = tables.build()?.bind(move |_: ()| {
            let store = store.clone();
            async move {
                let mut tx = store.begin().await?;
                tx.list_tables().await
            }
        });

        Ok(BookingTransactionManager {
            store: self.store,
            by_id,
            search,
            tables,
            invalidator: invalidator.build()?,
            default_page_size: self.default_page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::model::ContactInfo;
    use crate::booking::store::InMemoryStore;
    use crate::cache::SharedCache;
    use crate::error::CacheError;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn setup() -> (BookingTransactionManager, SharedCache, InMemoryStore) {
        let store = InMemoryStore::with_tables((1..=6).map(|id| Table::new(id, id as u32, 4)));
        let cache = SharedCache::new();
        let manager = BookingTransactionManager::builder(Arc::new(store.clone()))
            .cache(cache.backend())
            .build()
            .unwrap();
        (manager, cache, store)
    }

    fn input(hour: u32, tables: &[TableId]) -> NewReservation {
        NewReservation::new(at(hour), 2, tables.iter().copied(), ContactInfo::named("Grace"))
    }

    #[test]
    fn test_build_without_cache_fails() {
        let result = BookingTransactionManager::builder(Arc::new(InMemoryStore::new())).build();
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_key_namespaces_do_not_collide() {
        let by_id = reservation_cache_key(1).unwrap();
        assert!(!by_id.starts_with(&reservation_search_prefix()));
        assert!(!by_id.starts_with(&CacheKey::prefix(TABLE_LIST_OP)));
    }

    #[tokio::test]
    async fn test_validate_tables() {
        let (_, _, store) = setup();
        let mut tx = store.begin().await.unwrap();

        assert!(validate_tables(tx.as_mut(), &BTreeSet::new()).await.is_ok());
        assert!(validate_tables(tx.as_mut(), &BTreeSet::from([1, 6])).await.is_ok());

        let err = validate_tables(tx.as_mut(), &BTreeSet::from([1, 7, 9]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BookingError::Validation("unknown table ids: [7, 9]".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_excludes_itself_from_conflicts() {
        let (manager, _, _) = setup();

        let outcome = manager.create_reservation(input(18, &[5])).await.unwrap();

        assert_eq!(outcome.reservation.id, 1);
        assert!(outcome.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_create_evicts_search_results() {
        let (manager, cache, _) = setup();
        manager.search(SearchCriteria::default()).await.unwrap();
        assert_eq!(cache.keys().await.unwrap().len(), 1);

        manager.create_reservation(input(18, &[1])).await.unwrap();

        assert!(cache.keys().await.unwrap().is_empty());
        let page = manager.search(SearchCriteria::default()).await.unwrap();
        assert_eq!(page.total_count, 1);
    }

    #[tokio::test]
    async fn test_update_time_skips_conflict_check() {
        let (manager, _, _) = setup();
        manager.create_reservation(input(18, &[5])).await.unwrap();
        let second = manager.create_reservation(input(12, &[5])).await.unwrap();

        let moved = manager
            .update_time(second.reservation.id, at(18))
            .await
            .unwrap();

        assert_eq!(moved.reservation.time, at(18));
        assert!(moved.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_update_tables_reports_conflicts() {
        let (manager, _, _) = setup();
        manager.create_reservation(input(18, &[5])).await.unwrap();
        let other = manager.create_reservation(input(18, &[2])).await.unwrap();

        let moved = manager
            .update_tables(other.reservation.id, [5, 6])
            .await
            .unwrap();

        assert_eq!(moved.reservation.tables, BTreeSet::from([5, 6]));
        assert_eq!(moved.conflicts.len(), 1);
        assert_eq!(moved.conflicts[0].reservation_id, 1);
        assert_eq!(moved.conflicts[0].tables, BTreeSet::from([5]));
    }

    #[tokio::test]
    async fn test_perform_update_without_flag_skips_conflicts() {
        let (manager, _, _) = setup();
        manager.create_reservation(input(18, &[5])).await.unwrap();
        let other = manager.create_reservation(input(18, &[2])).await.unwrap();

        let patch = ReservationPatch {
            tables: Some(BTreeSet::from([5])),
            ..Default::default()
        };
        let outcome = manager
            .perform_update(other.reservation.id, patch, false)
            .await
            .unwrap();
        assert!(outcome.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_guest_comment_and_allergy_updates() {
        let (manager, _, _) = setup();
        let id = manager
            .create_reservation(input(18, &[1]))
            .await
            .unwrap()
            .reservation
            .id;

        manager
            .update_guest_info(
                id,
                GuestInfo {
                    guests_count: Some(6),
                    contact: Some(ContactInfo {
                        name: "Grace Hopper".to_string(),
                        phone: Some("555-0100".to_string()),
                        email: None,
                    }),
                },
            )
            .await
            .unwrap();
        manager.update_comment(id, "anniversary").await.unwrap();
        let outcome = manager.update_allergies(id, "peanuts").await.unwrap();

        let reservation = outcome.reservation;
        assert_eq!(reservation.guests_count, 6);
        assert_eq!(reservation.contact.phone.as_deref(), Some("555-0100"));
        assert_eq!(reservation.comments.as_deref(), Some("anniversary"));
        assert_eq!(reservation.allergies.as_deref(), Some("peanuts"));
        assert_eq!(manager.get_by_id(id).await.unwrap(), reservation);
    }

    #[tokio::test]
    async fn test_list_tables_is_cached() {
        let (manager, cache, store) = setup();

        assert_eq!(manager.list_tables().await.unwrap().len(), 6);
        store.add_table(Table::new(7, 7, 2)).await;

        assert_eq!(manager.list_tables().await.unwrap().len(), 6);
        assert!(cache
            .has(&CacheKey::build(TABLE_LIST_OP, &()).unwrap())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_missing_reservation_is_not_found() {
        let (manager, cache, _) = setup();

        assert!(matches!(
            manager.get_by_id(42).await,
            Err(BookingError::NotFound(_))
        ));
        assert!(matches!(
            manager.update_comment(42, "x").await,
            Err(BookingError::NotFound(_))
        ));
        assert!(matches!(
            manager.delete_reservation(42).await,
            Err(BookingError::NotFound(_))
        ));
        assert!(cache.is_empty().await, "errors are never cached");
    }
}
