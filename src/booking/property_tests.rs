//! Property-Based Tests for Booking Module

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use crate::booking::{
    check_conflicts, is_conflict, BookingTransactionManager, ContactInfo, InMemoryStore,
    NewReservation, Reservation, ReservationPatch, ReservationStatus, Table, TableId,
};
use crate::cache::SharedCache;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
}

fn manager() -> BookingTransactionManager {
    let store = InMemoryStore::with_tables((1..=8).map(|id| Table::new(id, id as u32, 4)));
    BookingTransactionManager::builder(Arc::new(store))
        .cache(SharedCache::new().backend())
        .build()
        .unwrap()
}

// == Strategies ==
fn status_strategy() -> impl Strategy<Value = ReservationStatus> {
    prop::sample::select(ReservationStatus::ALL.to_vec())
}

fn tables_strategy() -> impl Strategy<Value = BTreeSet<TableId>> {
    prop::collection::btree_set(1u64..=8, 0..4)
}

prop_compose! {
    fn stored_strategy()(
        id in 1u64..50,
        offset_minutes in -300i64..300,
        tables in tables_strategy(),
        status in status_strategy(),
    ) -> Reservation {
        let input = NewReservation {
            status: Some(status),
            ..NewReservation::new(
                base() + Duration::minutes(offset_minutes),
                2,
                tables,
                ContactInfo::named("guest"),
            )
        };
        Reservation::from_new(id, input, base())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // **Property: conflict predicate**
    // A stored reservation is reported exactly when it is active, not excluded,
    // shares a table and starts within [start, start + 2h).
    #[test]
    fn prop_conflict_matches_forward_window(
        stored in stored_strategy(),
        requested in tables_strategy(),
        exclude in prop::option::of(1u64..50),
    ) {
        let start = base();
        let expected = stored.is_active
            && exclude != Some(stored.id)
            && !stored.tables.is_disjoint(&requested)
            && stored.time >= start
            && stored.time < start + Duration::hours(2);

        prop_assert_eq!(is_conflict(&stored, &requested, start, exclude), expected);

        let records = check_conflicts([&stored], &requested, start, exclude);
        prop_assert_eq!(records.len(), usize::from(expected));
        for record in records {
            prop_assert!(!record.tables.is_empty());
            prop_assert!(record.tables.is_subset(&requested));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    // **Property: status drives activity**
    // After any sequence of status updates, `is_active` reflects the last status.
    #[test]
    fn prop_status_drives_is_active(statuses in prop::collection::vec(status_strategy(), 1..8)) {
        tokio_test::block_on(async {
            let manager = manager();
            let id = manager
                .create_reservation(NewReservation::new(base(), 2, [1], ContactInfo::named("a")))
                .await
                .unwrap()
                .reservation
                .id;

            for status in statuses {
                let outcome = manager.update_status(id, status).await.unwrap();
                prop_assert_eq!(outcome.reservation.is_active, status.is_active());
                prop_assert!(outcome.conflicts.is_empty());

                let read = manager.get_by_id(id).await.unwrap();
                prop_assert_eq!(read.status, status);
                prop_assert_eq!(read.is_active, status.is_active());
            }
            Ok(())
        })?;
    }

    // **Property: read after write**
    // A read that follows a completed update never returns the pre-update value.
    #[test]
    fn prop_read_after_write(
        comments in prop::collection::vec("[a-z ]{1,20}", 1..5),
        guests in 1u32..12,
    ) {
        tokio_test::block_on(async {
            let manager = manager();
            let id = manager
                .create_reservation(NewReservation::new(base(), 2, [2], ContactInfo::named("b")))
                .await
                .unwrap()
                .reservation
                .id;

            for comment in comments {
                // Warm the cache with the current value.
                manager.get_by_id(id).await.unwrap();

                let patch = ReservationPatch {
                    comments: Some(comment.clone()),
                    guests_count: Some(guests),
                    ..Default::default()
                };
                manager.update(id, patch).await.unwrap();

                let read = manager.get_by_id(id).await.unwrap();
                prop_assert_eq!(read.comments.as_deref(), Some(comment.as_str()));
                prop_assert_eq!(read.guests_count, guests);
            }
            Ok(())
        })?;
    }
}
