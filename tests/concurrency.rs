//! Гонки за места: параллельные брони и отмены одного события.

mod common;

use std::sync::Arc;
use std::time::Duration;

use event_booking::error::AppError;
use event_booking::storage::{LedgerStore, MemoryStore};
use futures::future::join_all;

use common::{ledger_with, seat_totals, upcoming_event, user_ids};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_seat_goes_to_exactly_one_user() {
    let ledger = Arc::new(ledger_with(MemoryStore::default(), &[upcoming_event("e1", 1)]).await);

    let tasks = ["alice", "bob"].into_iter().map(|user| {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.create_booking(user, "e1", 1).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let full = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::CapacityExceeded { available: 0 })))
        .count();
    assert_eq!((ok, full), (1, 1));
    assert_eq!(seat_totals(&ledger, "e1").await, (1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn crowd_never_overbooks() {
    let capacity = 25;
    let ledger = Arc::new(ledger_with(MemoryStore::default(), &[upcoming_event("e1", capacity)]).await);

    let tasks = user_ids("crowd", 60).into_iter().enumerate().map(|(i, user)| {
        let ledger = ledger.clone();
        let seats = if i % 2 == 0 { 2 } else { 1 };
        tokio::spawn(async move { ledger.create_booking(&user, "e1", seats).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    for r in &results {
        assert!(
            matches!(r, Ok(_) | Err(AppError::CapacityExceeded { .. })),
            "unexpected outcome {:?}",
            r
        );
    }

    let (booked, confirmed) = seat_totals(&ledger, "e1").await;
    assert_eq!(booked, confirmed);
    assert!(booked <= capacity);
    // Одноместные брони добивают остаток, так что зал заполнен полностью
    assert_eq!(booked, capacity);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_user_racing_gets_one_booking() {
    let ledger = Arc::new(ledger_with(MemoryStore::default(), &[upcoming_event("e1", 50)]).await);

    let tasks = (0..10).map(|_| {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.create_booking("alice", "e1", 1).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(AppError::DuplicateBooking))));
    assert_eq!(seat_totals(&ledger, "e1").await, (1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn cancellations_racing_bookings_keep_counter_consistent() {
    let ledger = Arc::new(ledger_with(MemoryStore::default(), &[upcoming_event("e1", 20)]).await);

    let first_wave = user_ids("early", 10);
    let mut held = Vec::new();
    for user in &first_wave {
        held.push(ledger.create_booking(user, "e1", 2).await.unwrap());
    }
    assert_eq!(seat_totals(&ledger, "e1").await, (20, 20));

    let cancels = held.into_iter().map(|b| {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.cancel_booking(&b.id, &b.user_id).await.map(|_| ()) })
    });
    let creates = user_ids("late", 15).into_iter().map(|user| {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.create_booking(&user, "e1", 2).await.map(|_| ()) })
    });
    let outcomes = join_all(cancels.chain(creates)).await;

    for outcome in outcomes {
        match outcome.unwrap() {
            Ok(()) | Err(AppError::CapacityExceeded { .. }) => {}
            Err(e) => panic!("unexpected error {:?}", e),
        }
    }

    let (booked, confirmed) = seat_totals(&ledger, "e1").await;
    assert_eq!(booked, confirmed);
    assert!((0..=20).contains(&booked));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn events_are_independent() {
    let ledger = Arc::new(
        ledger_with(
            MemoryStore::default(),
            &[upcoming_event("e1", 10), upcoming_event("e2", 10)],
        )
        .await,
    );

    let mut tasks = Vec::new();
    for user in user_ids("both", 10) {
        for event_id in ["e1", "e2"] {
            let ledger = ledger.clone();
            let user = user.clone();
            tasks.push(tokio::spawn(async move {
                ledger.create_booking(&user, event_id, 1).await
            }));
        }
    }
    let results = join_all(tasks).await;
    assert!(results.into_iter().all(|r| r.unwrap().is_ok()));

    assert_eq!(seat_totals(&ledger, "e1").await, (10, 10));
    assert_eq!(seat_totals(&ledger, "e2").await, (10, 10));
}

#[tokio::test]
async fn held_lock_makes_booking_busy_without_side_effects() {
    let store = MemoryStore::new(Duration::from_millis(50));
    let ledger = ledger_with(store.clone(), &[upcoming_event("e1", 10)]).await;

    let held = store.lock_event("e1").await.unwrap().unwrap();
    let err = ledger.create_booking("alice", "e1", 1).await.unwrap_err();
    assert!(matches!(err, AppError::Busy));
    assert!(err.is_retryable());
    drop(held);

    assert_eq!(seat_totals(&ledger, "e1").await, (0, 0));
    // После освобождения блокировки повтор проходит
    ledger.create_booking("alice", "e1", 1).await.unwrap();
    assert_eq!(seat_totals(&ledger, "e1").await, (1, 1));
}
