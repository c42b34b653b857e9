//! memory.rs
//!
//! Хранилище внутри процесса. Взаимное исключение по событию даёт
//! `tokio::sync::Mutex`, который берётся с таймаутом; изменения транзакции
//! копятся локально и применяются к таблицам одним шагом в `commit`.
//! Для тестов и для встраивания ledger в один процесс; HTTP-сервис
//! (AppState) всегда собирается на PostgreSQL.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

use super::{EventTx, LedgerStore, StoreError, StoreResult};
use crate::models::booking::newest_first;
use crate::models::{Booking, BookingScope, BookingStatus, Event, EventFilter, UserSummary};

#[derive(Default)]
struct Tables {
    events: HashMap<String, Event>,
    bookings: HashMap<String, Booking>,
    users: HashMap<String, UserSummary>,
}

impl Tables {
    fn confirmed_for(&self, user_id: &str, event_id: &str) -> Option<&Booking> {
        self.bookings
            .values()
            .find(|b| b.user_id == user_id && b.event_id == event_id && b.is_confirmed())
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    locks: LockMap,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            locks: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout,
        }
    }

    /// Пользователи живут вне ledger; здесь только то, что нужно для выдачи.
    pub fn insert_user(&self, user: UserSummary) {
        self.tables.lock().users.insert(user.id.clone(), user);
    }

    fn event_lock(&self, event_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(event_id.to_string())
            .or_default()
            .clone()
    }
}

type LockMap = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Убрать мьютекс события из карты, если кроме карты и `mutex` на него
/// никто не ссылается. Новые ссылки появляются только под замком карты.
fn forget_if_idle(locks: &LockMap, event_id: &str, mutex: &Arc<tokio::sync::Mutex<()>>) {
    let mut locks = locks.lock();
    let idle = locks
        .get(event_id)
        .is_some_and(|m| Arc::ptr_eq(m, mutex) && Arc::strong_count(mutex) == 2);
    if idle {
        locks.remove(event_id);
    }
}

/// Захваченная блокировка события. При drop отпускает мьютекс и
/// вычищает запись из карты, если её больше никто не ждёт.
struct HeldLock {
    locks: LockMap,
    event_id: String,
    mutex: Arc<tokio::sync::Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        self.guard.take();
        forget_if_idle(&self.locks, &self.event_id, &self.mutex);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn lock_event(&self, event_id: &str) -> StoreResult<Option<MemoryTx>> {
        let mutex = self.event_lock(event_id);
        let guard = match tokio::time::timeout(self.lock_timeout, mutex.clone().lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                forget_if_idle(&self.locks, event_id, &mutex);
                return Err(StoreError::Busy);
            }
        };
        let held = HeldLock {
            locks: self.locks.clone(),
            event_id: event_id.to_string(),
            mutex,
            guard: Some(guard),
        };

        // Для отсутствующего события held уходит в drop здесь же
        let event = self.tables.lock().events.get(event_id).cloned();
        Ok(event.map(|event| MemoryTx {
            tables: self.tables.clone(),
            event,
            inserted: Vec::new(),
            cancelled: Vec::new(),
            details_changed: false,
            deleted: false,
            _lock: held,
        }))
    }

    async fn find_event(&self, event_id: &str) -> StoreResult<Option<Event>> {
        Ok(self.tables.lock().events.get(event_id).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> StoreResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .tables
            .lock()
            .events
            .values()
            .filter(|e| filter.matches_stored(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.event_date
                .cmp(&b.event_date)
                .then_with(|| a.start_time.cmp(&b.start_time))
        });
        Ok(events)
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        if tables.events.contains_key(&event.id) {
            return Err(StoreError::UniqueViolation("events_pkey".into()));
        }
        if tables.events.values().any(|e| e.event_code == event.event_code) {
            return Err(StoreError::UniqueViolation("events_event_code_key".into()));
        }
        tables.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn find_booking(&self, booking_id: &str) -> StoreResult<Option<Booking>> {
        Ok(self.tables.lock().bookings.get(booking_id).cloned())
    }

    async fn list_bookings(&self, scope: &BookingScope) -> StoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .tables
            .lock()
            .bookings
            .values()
            .filter(|b| scope.matches(b))
            .cloned()
            .collect();
        newest_first(&mut bookings);
        Ok(bookings)
    }

    async fn find_users(&self, user_ids: &[String]) -> StoreResult<Vec<UserSummary>> {
        let tables = self.tables.lock();
        Ok(user_ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }
}

pub struct MemoryTx {
    tables: Arc<Mutex<Tables>>,
    // Рабочая копия события
    event: Event,
    inserted: Vec<Booking>,
    cancelled: Vec<String>,
    details_changed: bool,
    deleted: bool,
    _lock: HeldLock,
}

impl MemoryTx {
    fn overlay(&self, mut booking: Booking) -> Booking {
        if self.cancelled.contains(&booking.id) {
            booking.status = BookingStatus::Cancelled;
        }
        booking
    }
}

#[async_trait]
impl EventTx for MemoryTx {
    fn event(&self) -> &Event {
        &self.event
    }

    async fn find_booking(&mut self, booking_id: &str) -> StoreResult<Option<Booking>> {
        if let Some(b) = self.inserted.iter().find(|b| b.id == booking_id) {
            return Ok(Some(self.overlay(b.clone())));
        }
        let stored = self.tables.lock().bookings.get(booking_id).cloned();
        Ok(stored.map(|b| self.overlay(b)))
    }

    async fn find_confirmed_booking(&mut self, user_id: &str) -> StoreResult<Option<Booking>> {
        let staged = self
            .inserted
            .iter()
            .find(|b| b.user_id == user_id && !self.cancelled.contains(&b.id))
            .cloned();
        if staged.is_some() {
            return Ok(staged);
        }
        let stored = self
            .tables
            .lock()
            .confirmed_for(user_id, &self.event.id)
            .cloned();
        Ok(stored.filter(|b| !self.cancelled.contains(&b.id)))
    }

    async fn count_bookings(&mut self) -> StoreResult<i64> {
        let stored = self
            .tables
            .lock()
            .bookings
            .values()
            .filter(|b| b.event_id == self.event.id)
            .count();
        Ok((stored + self.inserted.len()) as i64)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        self.inserted.push(booking.clone());
        Ok(())
    }

    async fn mark_cancelled(&mut self, booking_id: &str) -> StoreResult<()> {
        self.cancelled.push(booking_id.to_string());
        Ok(())
    }

    async fn set_booked_seats(&mut self, booked_seats: i32) -> StoreResult<()> {
        self.event.booked_seats = booked_seats;
        Ok(())
    }

    async fn update_details(&mut self, event: &Event) -> StoreResult<()> {
        let booked_seats = self.event.booked_seats;
        self.event = Event { booked_seats, ..event.clone() };
        self.details_changed = true;
        Ok(())
    }

    async fn delete_event(&mut self) -> StoreResult<()> {
        self.deleted = true;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        let mut tables = self.tables.lock();

        // Проверки до первой записи, чтобы откат не понадобился
        for booking in &self.inserted {
            if booking.is_confirmed()
                && !self.cancelled.contains(&booking.id)
                && tables.confirmed_for(&booking.user_id, &booking.event_id).is_some_and(|b| !self.cancelled.contains(&b.id))
            {
                return Err(StoreError::UniqueViolation("unique_user_event_booking".into()));
            }
        }
        if self.details_changed
            && tables
                .events
                .values()
                .any(|e| e.id != self.event.id && e.event_code == self.event.event_code)
        {
            return Err(StoreError::UniqueViolation("events_event_code_key".into()));
        }

        if self.deleted {
            tables.events.remove(&self.event.id);
            return Ok(());
        }

        for booking in &self.inserted {
            tables.bookings.insert(booking.id.clone(), booking.clone());
        }
        for id in &self.cancelled {
            if let Some(b) = tables.bookings.get_mut(id) {
                b.status = BookingStatus::Cancelled;
            }
        }
        tables.events.insert(self.event.id.clone(), self.event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventCategory, LocationType};
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn event(id: &str) -> Event {
        let now = Utc::now();
        Event {
            id: id.into(),
            event_code: format!("EVT-JAN2030-{}", id),
            title: "Concert".into(),
            description: "Live".into(),
            category: EventCategory::Music,
            location: "Hall".into(),
            location_type: LocationType::InPerson,
            event_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            capacity: 5,
            booked_seats: 0,
            image_url: None,
            created_by: "admin".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn dropped_tx_leaves_no_trace() {
        let store = MemoryStore::default();
        store.insert_event(&event("e1")).await.unwrap();

        {
            let mut tx = store.lock_event("e1").await.unwrap().unwrap();
            tx.insert_booking(&Booking::confirmed("u1", "e1", 2)).await.unwrap();
            tx.set_booked_seats(2).await.unwrap();
        }

        assert_eq!(store.find_event("e1").await.unwrap().unwrap().booked_seats, 0);
        assert!(store.list_bookings(&BookingScope::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_applies_staged_writes() {
        let store = MemoryStore::default();
        store.insert_event(&event("e1")).await.unwrap();

        let mut tx = store.lock_event("e1").await.unwrap().unwrap();
        let booking = Booking::confirmed("u1", "e1", 2);
        tx.insert_booking(&booking).await.unwrap();
        tx.set_booked_seats(2).await.unwrap();
        assert!(tx.find_confirmed_booking("u1").await.unwrap().is_some());
        tx.commit().await.unwrap();

        assert_eq!(store.find_event("e1").await.unwrap().unwrap().booked_seats, 2);
        assert_eq!(store.find_booking(&booking.id).await.unwrap(), Some(booking));
    }

    #[tokio::test]
    async fn second_locker_gets_busy_after_timeout() {
        let store = MemoryStore::new(Duration::from_millis(50));
        store.insert_event(&event("e1")).await.unwrap();

        let _held = store.lock_event("e1").await.unwrap().unwrap();
        let second = store.lock_event("e1").await;
        assert!(matches!(second, Err(StoreError::Busy)));
    }

    #[tokio::test]
    async fn other_events_are_not_blocked() {
        let store = MemoryStore::new(Duration::from_millis(50));
        store.insert_event(&event("e1")).await.unwrap();
        store.insert_event(&event("e2")).await.unwrap();

        let _held = store.lock_event("e1").await.unwrap().unwrap();
        assert!(store.lock_event("e2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_event_yields_none() {
        let store = MemoryStore::default();
        assert!(store.lock_event("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lock_map_does_not_grow_with_unknown_ids() {
        let store = MemoryStore::default();
        for i in 0..10_000 {
            assert!(store.lock_event(&format!("missing-{}", i)).await.unwrap().is_none());
        }
        assert_eq!(store.locks.lock().len(), 0);
    }

    #[tokio::test]
    async fn lock_entry_is_released_after_commit_drop_and_delete() {
        let store = MemoryStore::default();
        store.insert_event(&event("e1")).await.unwrap();
        store.insert_event(&event("e2")).await.unwrap();

        let tx = store.lock_event("e1").await.unwrap().unwrap();
        assert_eq!(store.locks.lock().len(), 1);
        tx.commit().await.unwrap();
        assert_eq!(store.locks.lock().len(), 0);

        drop(store.lock_event("e1").await.unwrap().unwrap());
        assert_eq!(store.locks.lock().len(), 0);

        let mut tx = store.lock_event("e2").await.unwrap().unwrap();
        tx.delete_event().await.unwrap();
        tx.commit().await.unwrap();
        assert!(store.find_event("e2").await.unwrap().is_none());
        assert_eq!(store.locks.lock().len(), 0);
    }

    #[tokio::test]
    async fn waiter_keeps_entry_until_it_is_done() {
        let store = MemoryStore::new(Duration::from_millis(50));
        store.insert_event(&event("e1")).await.unwrap();

        let held = store.lock_event("e1").await.unwrap().unwrap();
        assert!(matches!(store.lock_event("e1").await, Err(StoreError::Busy)));
        assert_eq!(store.locks.lock().len(), 1);

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.lock_event("e1").await.map(|tx| tx.is_some()) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(held);

        assert!(waiter.await.unwrap().unwrap());
        assert_eq!(store.locks.lock().len(), 0);
    }

    #[tokio::test]
    async fn unique_backstop_rejects_second_confirmed_booking() {
        let store = MemoryStore::default();
        store.insert_event(&event("e1")).await.unwrap();

        let mut tx = store.lock_event("e1").await.unwrap().unwrap();
        tx.insert_booking(&Booking::confirmed("u1", "e1", 1)).await.unwrap();
        tx.commit().await.unwrap();

        // Вставка в обход проверки find_confirmed_booking
        let mut tx = store.lock_event("e1").await.unwrap().unwrap();
        tx.insert_booking(&Booking::confirmed("u1", "e1", 1)).await.unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(c) if c == "unique_user_event_booking"));
        assert_eq!(store.list_bookings(&BookingScope::All).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_event_code_is_rejected() {
        let store = MemoryStore::default();
        store.insert_event(&event("e1")).await.unwrap();
        let mut clash = event("e2");
        clash.event_code = "EVT-JAN2030-e1".into();
        assert!(matches!(
            store.insert_event(&clash).await,
            Err(StoreError::UniqueViolation(_))
        ));
    }
}
