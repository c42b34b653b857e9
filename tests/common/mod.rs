#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Sentence;
use fake::Fake;

use event_booking::models::{Event, EventCategory, LocationType};
use event_booking::services::ledger::SeatLedger;
use event_booking::services::lifecycle::FixedClock;
use event_booking::storage::{LedgerStore, MemoryStore};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

pub fn upcoming_event(id: &str, capacity: i32) -> Event {
    let now = Utc::now();
    let title: String = Sentence(2..4).fake();
    Event {
        id: id.to_string(),
        event_code: format!("EVT-NOV2026-{}", id.to_uppercase()),
        title,
        description: Sentence(5..10).fake(),
        category: EventCategory::Arts,
        location: "Gallery".to_string(),
        location_type: LocationType::InPerson,
        event_date: today() + Duration::days(14),
        start_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        capacity,
        booked_seats: 0,
        image_url: None,
        created_by: "admin".to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Уникальные id пользователей; префикс разводит группы между собой.
pub fn user_ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("{}-{}-{}", prefix, i, SafeEmail().fake::<String>()))
        .collect()
}

pub async fn ledger_with(
    store: MemoryStore,
    events: &[Event],
) -> SeatLedger<MemoryStore, FixedClock> {
    for e in events {
        store.insert_event(e).await.unwrap();
    }
    SeatLedger::new(store, FixedClock(today()))
}

/// bookedSeats события и сумма мест подтверждённых броней.
pub async fn seat_totals(ledger: &SeatLedger<MemoryStore, FixedClock>, event_id: &str) -> (i32, i32) {
    let event = ledger.store().find_event(event_id).await.unwrap().unwrap();
    let confirmed: i32 = ledger
        .list_bookings_for_event(event_id)
        .await
        .unwrap()
        .iter()
        .filter(|b| b.is_confirmed())
        .map(|b| b.seats)
        .sum();
    (event.booked_seats, confirmed)
}
