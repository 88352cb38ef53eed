//! Booking Module
//!
//! Table reservations: data model, conflict detection, the data store seam
//! and the transaction manager that ties them to the cache.

pub mod conflict;
pub mod manager;
pub mod model;
pub mod store;

#[cfg(test)]
mod property_tests;

pub use conflict::{booking_window, check_conflicts, is_conflict, window_end, BOOKING_WINDOW_HOURS};
pub use manager::{
    reservation_cache_key, reservation_search_prefix, validate_tables, BookingManagerBuilder,
    BookingTransactionManager, RESERVATION_BY_ID_OP, RESERVATION_SEARCH_OP, TABLE_LIST_OP,
};
pub use model::{
    BookingOutcome, ConflictRecord, ContactInfo, GuestInfo, NewReservation, Page, Reservation,
    ReservationId, ReservationPatch, ReservationStatus, SearchCriteria, SortOrder, Table, TableId,
    TableStatus,
};
pub use store::{DataStore, InMemoryStore, Transaction};
