//! Инварианты SeatLedger на случайных последовательностях операций.

mod common;

use std::collections::HashSet;

use event_booking::error::AppError;
use event_booking::storage::MemoryStore;
use proptest::prelude::*;

use common::{ledger_with, seat_totals, upcoming_event};

#[derive(Debug, Clone)]
enum Op {
    Create { user: usize, event: usize, seats: i32 },
    Cancel { pick: usize, user: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..4, 0usize..2, -1i32..4).prop_map(|(user, event, seats)| Op::Create { user, event, seats }),
        1 => (0usize..32, 0usize..4).prop_map(|(pick, user)| Op::Cancel { pick, user }),
    ]
}

const EVENTS: [&str; 2] = ["e0", "e1"];
const CAPACITIES: [i32; 2] = [3, 5];

fn user(i: usize) -> String {
    format!("user-{}", i)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_after_every_step(ops in prop::collection::vec(op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

        rt.block_on(async {
            let events: Vec<_> = EVENTS
                .iter()
                .zip(CAPACITIES)
                .map(|(id, cap)| upcoming_event(id, cap))
                .collect();
            let ledger = ledger_with(MemoryStore::default(), &events).await;
            let mut created = Vec::new();

            for op in ops {
                match op {
                    Op::Create { user: u, event, seats } => {
                        let result = ledger.create_booking(&user(u), EVENTS[event], seats).await;
                        if !(1..=2).contains(&seats) {
                            prop_assert!(matches!(result, Err(AppError::Validation(_))));
                        }
                        match result {
                            Ok(b) => created.push(b),
                            Err(AppError::Validation(_))
                            | Err(AppError::DuplicateBooking)
                            | Err(AppError::CapacityExceeded { .. }) => {}
                            Err(e) => prop_assert!(false, "unexpected error {:?}", e),
                        }
                    }
                    Op::Cancel { pick, user: u } => {
                        if created.is_empty() {
                            continue;
                        }
                        let booking = &created[pick % created.len()];
                        let result = ledger.cancel_booking(&booking.id, &user(u)).await;
                        match result {
                            Ok(_) => prop_assert_eq!(&booking.user_id, &user(u)),
                            Err(AppError::Forbidden(_)) => prop_assert_ne!(&booking.user_id, &user(u)),
                            Err(AppError::AlreadyCancelled) => {}
                            Err(e) => prop_assert!(false, "unexpected error {:?}", e),
                        }
                    }
                }

                for (id, cap) in EVENTS.iter().zip(CAPACITIES) {
                    let (booked, confirmed) = seat_totals(&ledger, id).await;
                    prop_assert_eq!(booked, confirmed);
                    prop_assert!(booked <= cap);
                }

                let all = ledger.list_all_bookings().await.unwrap();
                let mut active = HashSet::new();
                for b in all.iter().filter(|b| b.is_confirmed()) {
                    prop_assert!(active.insert((b.user_id.clone(), b.event_id.clone())));
                }
            }
            Ok(())
        })?;
    }
}
