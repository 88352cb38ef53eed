//! Conflict detection
//!
//! Pure overlap checks between a requested booking and stored reservations.
//! Results are advisory: the caller decides whether to block or warn.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::booking::model::{ConflictRecord, Reservation, ReservationId, TableId};

/// Every reservation occupies its tables for this long.
pub const BOOKING_WINDOW_HOURS: i64 = 2;

pub fn booking_window() -> Duration {
    Duration::hours(BOOKING_WINDOW_HOURS)
}

/// Exclusive end of the window starting at `start`.
pub fn window_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start + booking_window()
}

/// Whether `candidate` conflicts with a booking of `table_ids` starting at `start`.
///
/// A stored reservation conflicts when it is active, is not `exclude`,
/// shares at least one table, and starts inside `[start, start + 2h)`.
/// Reservations that started earlier but are still running at `start` are
/// not reported.
#[allow(clippy::nonminimal_bool)]
pub fn is_conflict(
    candidate: &Reservation,
    table_ids: &BTreeSet<TableId>,
    start: DateTime<Utc>,
    exclude: Option<ReservationId>,
) -> bool {
    let end = window_end(start);

    if !candidate.is_active {
        return false;
    }
    if exclude == Some(candidate.id) {
        return false;
    }
    if candidate.tables.is_disjoint(table_ids) {
        return false;
    }

    // The second disjunct never holds while end > start.
    candidate.time < end
        && (candidate.time >= start || (candidate.time < start && candidate.time >= end))
}

/// Returns every stored reservation in `candidates` that conflicts with the
/// requested booking, ordered by start time then id.
pub fn check_conflicts<'a, I>(
    candidates: I,
    table_ids: &BTreeSet<TableId>,
    start: DateTime<Utc>,
    exclude: Option<ReservationId>,
) -> Vec<ConflictRecord>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    let mut conflicts: Vec<ConflictRecord> = candidates
        .into_iter()
        .filter(|candidate| is_conflict(candidate, table_ids, start, exclude))
        .map(|candidate| ConflictRecord {
            reservation_id: candidate.id,
            time: candidate.time,
            tables: candidate.tables.intersection(table_ids).copied().collect(),
        })
        .collect();

    conflicts.sort_by_key(|c| (c.time, c.reservation_id));
    conflicts
}
