//! Booking data model
//!
//! Tables, reservations, update patches, conflict records and paging types.
//! Everything serializes as camelCase JSON; that is also the form the cache
//! stores.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::conflict::window_end;

pub type TableId = u64;
pub type ReservationId = u64;

/// Upper bound for `SearchCriteria::page_size`.
pub const MAX_PAGE_SIZE: u32 = 100;

// == Tables ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Available,
    Occupied,
    Reserved,
    OutOfService,
}

/// A dining table. Owned by table management; this crate only checks existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: TableId,
    pub table_number: u32,
    pub capacity: u32,
    pub status: TableStatus,
}

impl Table {
    pub fn new(id: TableId, table_number: u32, capacity: u32) -> Self {
        Self {
            id,
            table_number,
            capacity,
            status: TableStatus::Available,
        }
    }
}

// == Reservations ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Confirmed,
    Seated,
    Completed,
    Cancelled,
    NoShow,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 6] = [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Seated,
        ReservationStatus::Completed,
        ReservationStatus::Cancelled,
        ReservationStatus::NoShow,
    ];

    /// A reservation holds its tables unless it was cancelled or the guests never came.
    pub fn is_active(self) -> bool {
        !matches!(self, ReservationStatus::Cancelled | ReservationStatus::NoShow)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ContactInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: ReservationId,
    /// Start of the booking window
    pub time: DateTime<Utc>,
    pub guests_count: u32,
    pub status: ReservationStatus,
    pub tables: BTreeSet<TableId>,
    pub comments: Option<String>,
    pub allergies: Option<String>,
    pub contact: ContactInfo,
    /// Always `status.is_active()`
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Materializes a new row with an id assigned by the data store.
    pub fn from_new(id: ReservationId, input: NewReservation, now: DateTime<Utc>) -> Self {
        let status = input.status.unwrap_or_default();
        Self {
            id,
            time: input.time,
            guests_count: input.guests_count,
            status,
            tables: input.tables,
            comments: input.comments,
            allergies: input.allergies,
            contact: input.contact,
            is_active: status.is_active(),
            created_at: now,
            updated_at: now,
        }
    }

    /// End of the booking window, exclusive.
    pub fn ends_at(&self) -> DateTime<Utc> {
        window_end(self.time)
    }
}

/// Input for creating a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    pub time: DateTime<Utc>,
    pub guests_count: u32,
    pub tables: BTreeSet<TableId>,
    pub contact: ContactInfo,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    /// Defaults to `Pending`
    #[serde(default)]
    pub status: Option<ReservationStatus>,
}

impl NewReservation {
    pub fn new(
        time: DateTime<Utc>,
        guests_count: u32,
        tables: impl IntoIterator<Item = TableId>,
        contact: ContactInfo,
    ) -> Self {
        Self {
            time,
            guests_count,
            tables: tables.into_iter().collect(),
            contact,
            comments: None,
            allergies: None,
            status: None,
        }
    }
}

/// Partial update. Only the fields that are `Some` change.
///
/// There is no `is_active` field: it follows `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPatch {
    pub time: Option<DateTime<Utc>>,
    pub guests_count: Option<u32>,
    pub status: Option<ReservationStatus>,
    /// Replaces the whole table set
    pub tables: Option<BTreeSet<TableId>>,
    pub comments: Option<String>,
    pub allergies: Option<String>,
    pub contact: Option<ContactInfo>,
}

impl ReservationPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Writes the present fields into `reservation` and stamps `updated_at`.
    pub fn apply(self, reservation: &mut Reservation, now: DateTime<Utc>) {
        if let Some(time) = self.time {
            reservation.time = time;
        }
        if let Some(guests_count) = self.guests_count {
            reservation.guests_count = guests_count;
        }
        if let Some(status) = self.status {
            reservation.status = status;
            reservation.is_active = status.is_active();
        }
        if let Some(tables) = self.tables {
            reservation.tables = tables;
        }
        if let Some(comments) = self.comments {
            reservation.comments = Some(comments);
        }
        if let Some(allergies) = self.allergies {
            reservation.allergies = Some(allergies);
        }
        if let Some(contact) = self.contact {
            reservation.contact = contact;
        }
        reservation.updated_at = now;
    }
}

/// Guest-facing details changed together by `update_guest_info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestInfo {
    pub guests_count: Option<u32>,
    pub contact: Option<ContactInfo>,
}

// == Conflicts ==
/// An existing reservation overlapping a requested booking. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub reservation_id: ReservationId,
    pub time: DateTime<Utc>,
    /// Tables shared with the request
    pub tables: BTreeSet<TableId>,
}

/// Result of every mutating booking operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOutcome {
    pub reservation: Reservation,
    /// Advisory only; the write already happened
    pub conflicts: Vec<ConflictRecord>,
}

// == Search ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    #[default]
    TimeAsc,
    TimeDesc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub status: Option<ReservationStatus>,
    pub is_active: Option<bool>,
    pub table_id: Option<TableId>,
    /// Inclusive lower bound on `time`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `time`
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the contact name
    pub contact_name: Option<String>,
    /// 1-based
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    #[serde(default)]
    pub sort: SortOrder,
}

impl SearchCriteria {
    /// Fills paging defaults and lowercases the name filter, so equal
    /// searches share one cache key.
    pub fn normalized(mut self, default_page_size: u32) -> Self {
        self.page = Some(self.page.unwrap_or(1).max(1));
        self.page_size = Some(
            self.page_size
                .unwrap_or(default_page_size)
                .clamp(1, MAX_PAGE_SIZE),
        );
        self.contact_name = self
            .contact_name
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty());
        self
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn matches(&self, reservation: &Reservation) -> bool {
        if self.status.is_some_and(|s| s != reservation.status) {
            return false;
        }
        if self.is_active.is_some_and(|a| a != reservation.is_active) {
            return false;
        }
        if self
            .table_id
            .is_some_and(|t| !reservation.tables.contains(&t))
        {
            return false;
        }
        if self.from.is_some_and(|from| reservation.time < from) {
            return false;
        }
        if self.to.is_some_and(|to| reservation.time >= to) {
            return false;
        }
        if let Some(name) = &self.contact_name {
            if !reservation
                .contact
                .name
                .to_lowercase()
                .contains(&name.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64, page: u32, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_count.div_ceil(u64::from(page_size));
        Self {
            items,
            total_count,
            page,
            page_size,
            total_pages,
        }
    }
}
