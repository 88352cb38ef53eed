//! Data store seam
//!
//! The booking engine only talks to persistence through [`DataStore`] and
//! the [`Transaction`] it hands out. Every read and write of one booking
//! operation goes through the same transaction, so they commit or roll back
//! together. Dropping a transaction without committing rolls it back.
//!
//! [`InMemoryStore`] is the reference implementation used by tests and the
//! demo binary.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::booking::model::{
    NewReservation, Reservation, ReservationId, SearchCriteria, SortOrder, Table, TableId,
};
use crate::error::{BookingError, Result};

// == Traits ==
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Opens an atomic transaction scope.
    ///
    /// # Returns
    /// A transaction that must be committed to publish its writes. Dropping
    /// it rolls everything back.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

#[async_trait]
pub trait Transaction: Send {
    /// Returns the tables among `ids` that exist.
    async fn find_tables(&mut self, ids: &BTreeSet<TableId>) -> Result<Vec<Table>>;

    async fn list_tables(&mut self) -> Result<Vec<Table>>;

    /// Inserts a reservation with its table associations and returns the stored row.
    async fn insert_reservation(&mut self, input: NewReservation) -> Result<Reservation>;

    async fn get_reservation(&mut self, id: ReservationId) -> Result<Option<Reservation>>;

    /// Overwrites the row and replaces its table associations.
    async fn save_reservation(&mut self, reservation: &Reservation) -> Result<()>;

    /// Deletes the row and its table associations. Returns whether it existed.
    async fn delete_reservation(&mut self, id: ReservationId) -> Result<bool>;

    /// Every reservation associated with at least one of `ids`.
    async fn reservations_on_tables(&mut self, ids: &BTreeSet<TableId>) -> Result<Vec<Reservation>>;

    /// One page of matching reservations plus the total match count.
    ///
    /// # Arguments
    /// * `criteria` - Filters, sort order and paging
    ///
    /// # Returns
    /// `(items, total)` where `total` counts every match, not just this page.
    async fn search_reservations(
        &mut self,
        criteria: &SearchCriteria,
    ) -> Result<(Vec<Reservation>, u64)>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

// == In-Memory Store ==
#[derive(Debug, Clone, Default)]
struct StoreState {
    tables: BTreeMap<TableId, Table>,
    reservations: BTreeMap<ReservationId, Reservation>,
    last_id: ReservationId,
}

/// Serializable in-memory store.
///
/// One transaction runs at a time: `begin` takes an owned lock on the state
/// and works on a copy, which `commit` publishes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `tables` and no reservations.
    ///
    /// # Arguments
    /// * `tables` - Tables keyed by their id; later duplicates win
    pub fn with_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        let state = StoreState {
            tables: tables.into_iter().map(|t| (t.id, t)).collect(),
            ..StoreState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            fail_commits: Arc::default(),
        }
    }

    pub async fn add_table(&self, table: Table) {
        self.state.lock().await.tables.insert(table.id, table);
    }

    /// Makes every subsequent commit fail with [`BookingError::Internal`].
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of committed reservations.
    pub async fn reservation_count(&self) -> usize {
        self.state.lock().await.reservations.len()
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
    fail_commit: bool,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn find_tables(&mut self, ids: &BTreeSet<TableId>) -> Result<Vec<Table>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.tables.get(id).cloned())
            .collect())
    }

    async fn list_tables(&mut self) -> Result<Vec<Table>> {
        Ok(self.working.tables.values().cloned().collect())
    }

    async fn insert_reservation(&mut self, input: NewReservation) -> Result<Reservation> {
        self.working.last_id += 1;
        let reservation = Reservation::from_new(self.working.last_id, input, Utc::now());
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn get_reservation(&mut self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.working.reservations.get(&id).cloned())
    }

    async fn save_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        match self.working.reservations.get_mut(&reservation.id) {
            Some(row) => {
                *row = reservation.clone();
                Ok(())
            }
            None => Err(BookingError::reservation_not_found(reservation.id)),
        }
    }

    async fn delete_reservation(&mut self, id: ReservationId) -> Result<bool> {
        Ok(self.working.reservations.remove(&id).is_some())
    }

    async fn reservations_on_tables(&mut self, ids: &BTreeSet<TableId>) -> Result<Vec<Reservation>> {
        Ok(self
            .working
            .reservations
            .values()
            .filter(|r| !r.tables.is_disjoint(ids))
            .cloned()
            .collect())
    }

    async fn search_reservations(
        &mut self,
        criteria: &SearchCriteria,
    ) -> Result<(Vec<Reservation>, u64)> {
        let mut matches: Vec<&Reservation> = self
            .working
            .reservations
            .values()
            .filter(|r| criteria.matches(r))
            .collect();

        matches.sort_by_key(|r| (r.time, r.id));
        if criteria.sort == SortOrder::TimeDesc {
            matches.reverse();
        }

        let total = matches.len() as u64;
        let page_size = criteria.page_size() as usize;
        let offset = (criteria.page() as usize - 1).saturating_mul(page_size);

        let items = matches
            .into_iter()
            .skip(offset)
            .take(page_size)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail_commit {
            return Err(BookingError::Internal(
                "data store rejected the commit".to_string(),
            ));
        }

        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        debug!("transaction committed");
        Ok(())
    }
}
