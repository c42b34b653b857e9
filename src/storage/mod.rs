//! storage
//!
//! Контракт хранилища, которого требует SeatLedger: транзакция, открытая
//! эксклюзивной блокировкой одного события, условные изменения внутри неё и
//! commit-или-откат. Транзакция, брошенная без `commit`, откатывается.
//!
//! Реализации:
//! - [`postgres::PgLedgerStore`]: транзакция PostgreSQL + `SELECT ... FOR UPDATE`;
//! - [`memory::MemoryStore`]: мьютекс на событие внутри процесса (тесты и встраивание
//!   ledger как библиотеки; HTTP-сервис работает только на PostgreSQL).

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Booking, BookingScope, Event, EventFilter, UserSummary};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgLedgerStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Блокировку события не удалось взять за отведённое время.
    #[error("lock wait timed out")]
    Busy,

    #[error("unique constraint {0} violated")]
    UniqueViolation(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait LedgerStore: Clone + Send + Sync + 'static {
    type Tx: EventTx;

    /// Начать транзакцию и взять эксклюзивную блокировку события.
    /// `None`, если события нет.
    async fn lock_event(&self, event_id: &str) -> StoreResult<Option<Self::Tx>>;

    async fn find_event(&self, event_id: &str) -> StoreResult<Option<Event>>;

    /// События по хранимым полям фильтра, по возрастанию даты.
    async fn list_events(&self, filter: &EventFilter) -> StoreResult<Vec<Event>>;

    async fn insert_event(&self, event: &Event) -> StoreResult<()>;

    async fn find_booking(&self, booking_id: &str) -> StoreResult<Option<Booking>>;

    /// Бронирования, сначала новые.
    async fn list_bookings(&self, scope: &BookingScope) -> StoreResult<Vec<Booking>>;

    /// Краткие сведения о пользователях; неизвестные id пропускаются.
    async fn find_users(&self, user_ids: &[String]) -> StoreResult<Vec<UserSummary>>;
}

/// Транзакция над одним заблокированным событием.
#[async_trait]
pub trait EventTx: Send {
    /// Событие в том виде, в каком оно было прочитано под блокировкой,
    /// с учётом изменений этой транзакции.
    fn event(&self) -> &Event;

    async fn find_booking(&mut self, booking_id: &str) -> StoreResult<Option<Booking>>;

    async fn find_confirmed_booking(&mut self, user_id: &str) -> StoreResult<Option<Booking>>;

    /// Сколько бронирований (в любом статусе) ссылается на событие.
    async fn count_bookings(&mut self) -> StoreResult<i64>;

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn mark_cancelled(&mut self, booking_id: &str) -> StoreResult<()>;

    async fn set_booked_seats(&mut self, booked_seats: i32) -> StoreResult<()>;

    /// Обновить описательные поля, ёмкость и дату. `booked_seats` не трогается.
    async fn update_details(&mut self, event: &Event) -> StoreResult<()>;

    async fn delete_event(&mut self) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;
}
