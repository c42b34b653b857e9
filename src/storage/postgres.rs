//! postgres.rs
//!
//! Хранилище на PostgreSQL. Блокировка события это `SELECT ... FOR UPDATE`
//! внутри транзакции с локальным `lock_timeout`; уникальный частичный индекс
//! `unique_user_event_booking` страхует от двух подтверждённых броней.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::time::Duration;

use super::{EventTx, LedgerStore, StoreError, StoreResult};
use crate::models::{Booking, BookingScope, BookingStatus, Event, EventFilter, UserSummary};

const EVENT_COLUMNS: &str = "id, event_code, title, description, category, location, location_type, \
     event_date, start_time, end_time, capacity, booked_seats, image_url, created_by, \
     created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, user_id, event_id, seats, status, created_at";

// lock_not_available
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";
// unique_violation
const PG_UNIQUE_VIOLATION: &str = "23505";

fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::PoolTimedOut = err {
        return StoreError::Busy;
    }

    let (code, constraint) = match &err {
        sqlx::Error::Database(db) => (
            db.code().map(|c| c.into_owned()),
            db.constraint().map(str::to_string),
        ),
        _ => (None, None),
    };

    match code.as_deref() {
        Some(PG_LOCK_NOT_AVAILABLE) => StoreError::Busy,
        Some(PG_UNIQUE_VIOLATION) => {
            StoreError::UniqueViolation(constraint.unwrap_or_else(|| "unknown".to_string()))
        }
        _ => StoreError::Database(err),
    }
}

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgEventTx;

    async fn lock_event(&self, event_id: &str) -> StoreResult<Option<PgEventTx>> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // SET LOCAL не принимает параметры, значение целое и формируется здесь
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE id = $1 FOR UPDATE",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;

        // Без события транзакция просто откатывается при drop
        Ok(event.map(|event| PgEventTx { tx, event }))
    }

    async fn find_event(&self, event_id: &str) -> StoreResult<Option<Event>> {
        sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn list_events(&self, filter: &EventFilter) -> StoreResult<Vec<Event>> {
        let mut q: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM events WHERE TRUE", EVENT_COLUMNS));

        if let Some(category) = filter.category {
            q.push(" AND category = ").push_bind(category);
        }
        if let Some(location_type) = filter.location_type {
            q.push(" AND location_type = ").push_bind(location_type);
        }
        if let Some(start) = filter.start_date {
            q.push(" AND event_date >= ").push_bind(start);
        }
        if let Some(end) = filter.end_date {
            q.push(" AND event_date <= ").push_bind(end);
        }
        q.push(" ORDER BY event_date ASC, start_time ASC");

        q.build_query_as::<Event>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO events (id, event_code, title, description, category, location,
                                location_type, event_date, start_time, end_time, capacity,
                                booked_seats, image_url, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(&event.id)
        .bind(&event.event_code)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.category)
        .bind(&event.location)
        .bind(event.location_type)
        .bind(event.event_date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.capacity)
        .bind(event.booked_seats)
        .bind(&event.image_url)
        .bind(&event.created_by)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn find_booking(&self, booking_id: &str) -> StoreResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn list_bookings(&self, scope: &BookingScope) -> StoreResult<Vec<Booking>> {
        let mut q: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM bookings", BOOKING_COLUMNS));

        match scope {
            BookingScope::All => {}
            BookingScope::User(user_id) => {
                q.push(" WHERE user_id = ").push_bind(user_id.clone());
            }
            BookingScope::Event(event_id) => {
                q.push(" WHERE event_id = ").push_bind(event_id.clone());
            }
            BookingScope::Attendees(event_id) => {
                q.push(" WHERE event_id = ")
                    .push_bind(event_id.clone())
                    .push(" AND status = ")
                    .push_bind(BookingStatus::Confirmed);
            }
        }
        q.push(" ORDER BY created_at DESC, id DESC");

        q.build_query_as::<Booking>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn find_users(&self, user_ids: &[String]) -> StoreResult<Vec<UserSummary>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, UserSummary>("SELECT id, name, email FROM users WHERE id = ANY($1)")
            .bind(user_ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }
}

pub struct PgEventTx {
    tx: Transaction<'static, Postgres>,
    event: Event,
}

#[async_trait]
impl EventTx for PgEventTx {
    fn event(&self) -> &Event {
        &self.event
    }

    async fn find_booking(&mut self, booking_id: &str) -> StoreResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)
    }

    async fn find_confirmed_booking(&mut self, user_id: &str) -> StoreResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 AND event_id = $2 AND status = 'confirmed'",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .bind(&self.event.id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)
    }

    async fn count_bookings(&mut self) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings WHERE event_id = $1")
            .bind(&self.event.id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO bookings (id, user_id, event_id, seats, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&booking.id)
        .bind(&booking.user_id)
        .bind(&booking.event_id)
        .bind(booking.seats)
        .bind(booking.status)
        .bind(booking.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn mark_cancelled(&mut self, booking_id: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE bookings SET status = 'cancelled', updated_at = NOW()
             WHERE id = $1 AND event_id = $2",
        )
        .bind(booking_id)
        .bind(&self.event.id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn set_booked_seats(&mut self, booked_seats: i32) -> StoreResult<()> {
        sqlx::query("UPDATE events SET booked_seats = $1, updated_at = NOW() WHERE id = $2")
            .bind(booked_seats)
            .bind(&self.event.id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        self.event.booked_seats = booked_seats;
        Ok(())
    }

    async fn update_details(&mut self, event: &Event) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE events
            SET title = $1, description = $2, category = $3, location = $4,
                location_type = $5, event_date = $6, start_time = $7, end_time = $8,
                capacity = $9, image_url = $10, updated_at = $11
            WHERE id = $12
            "#,
        )
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.category)
        .bind(&event.location)
        .bind(event.location_type)
        .bind(event.event_date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.capacity)
        .bind(&event.image_url)
        .bind(event.updated_at)
        .bind(&self.event.id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        let booked_seats = self.event.booked_seats;
        self.event = Event { booked_seats, ..event.clone() };
        Ok(())
    }

    async fn delete_event(&mut self) -> StoreResult<()> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(&self.event.id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_db_error)
    }
}
