//! ledger.rs
//!
//! SeatLedger: единственный, кто пишет `booked_seats` и статус брони.
//!
//! Инварианты:
//! - `booked_seats` события равен сумме мест его подтверждённых броней и не
//!   превышает `capacity`;
//! - у пары (пользователь, событие) не больше одной подтверждённой брони.
//!
//! Создание и отмена выполняются целиком внутри транзакции, открытой
//! эксклюзивной блокировкой события, поэтому проверки и запись для одного
//! события не перемешиваются. Любая ошибка до `commit` откатывает всё.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{Booking, BookingScope, Role, UserSummary};
use crate::services::lifecycle::{Clock, SystemClock};
use crate::storage::{EventTx, LedgerStore};

/// Максимум мест в одной брони.
pub const MAX_SEATS_PER_BOOKING: i32 = 2;

/// Кто запрашивает бронь на чтение.
#[derive(Debug, Clone)]
pub struct Requester {
    pub user_id: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct SeatLedger<S, C = SystemClock> {
    store: S,
    clock: C,
}

fn require_id(value: &str, what: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("Please provide {}", what)));
    }
    Ok(())
}

impl<S: LedgerStore, C: Clock> SeatLedger<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Забронировать `seats` мест на событие.
    pub async fn create_booking(
        &self,
        user_id: &str,
        event_id: &str,
        seats: i32,
    ) -> AppResult<Booking> {
        require_id(user_id, "user ID")?;
        require_id(event_id, "event ID")?;
        if !(1..=MAX_SEATS_PER_BOOKING).contains(&seats) {
            return Err(AppError::Validation(
                "You can only book 1 or 2 seats per event".to_string(),
            ));
        }

        let mut tx = self
            .store
            .lock_event(event_id)
            .await?
            .ok_or(AppError::NotFound("Event"))?;

        let status = tx.event().status_on(self.clock.today());
        if !status.accepts_changes() {
            debug!("Booking rejected: event {} is {:?}", event_id, status);
            return Err(AppError::InvalidState { action: "book", status });
        }

        if tx.find_confirmed_booking(user_id).await?.is_some() {
            debug!("Booking rejected: user {} already booked event {}", user_id, event_id);
            return Err(AppError::DuplicateBooking);
        }

        let available = tx.event().available_seats();
        if available < seats {
            debug!("Booking rejected: event {} has {} seat(s) left, {} requested", event_id, available, seats);
            return Err(AppError::CapacityExceeded { available: available.max(0) });
        }

        let booking = Booking::confirmed(user_id, event_id, seats);
        let booked_seats = tx.event().booked_seats + seats;
        tx.insert_booking(&booking).await?;
        tx.set_booked_seats(booked_seats).await?;
        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            user_id = %booking.user_id,
            event_id = %booking.event_id,
            seats = booking.seats,
            created_at = %booking.created_at.format("%d-%b-%Y %H:%M"),
            "🎫 New booking created"
        );

        Ok(booking)
    }

    /// Отменить бронь. Отменить может только владелец и только до дня события.
    pub async fn cancel_booking(
        &self,
        booking_id: &str,
        requesting_user_id: &str,
    ) -> AppResult<Booking> {
        require_id(booking_id, "booking ID")?;

        // Событие брони неизменно, поэтому его можно узнать до блокировки
        let event_id = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or(AppError::NotFound("Booking"))?
            .event_id;

        let mut tx = self
            .store
            .lock_event(&event_id)
            .await?
            .ok_or(AppError::NotFound("Event"))?;

        // Перечитываем под блокировкой: статус мог смениться
        let mut booking = tx
            .find_booking(booking_id)
            .await?
            .ok_or(AppError::NotFound("Booking"))?;

        if booking.user_id != requesting_user_id {
            return Err(AppError::Forbidden("cancel this booking"));
        }
        if !booking.is_confirmed() {
            return Err(AppError::AlreadyCancelled);
        }

        let status = tx.event().status_on(self.clock.today());
        if !status.accepts_changes() {
            return Err(AppError::InvalidState { action: "cancel booking for", status });
        }

        let booked_seats = tx.event().booked_seats - booking.seats;
        if booked_seats < 0 {
            tracing::error!(
                "Seat counter of event {} would go negative cancelling booking {}",
                event_id, booking_id
            );
            return Err(AppError::Internal("seat counter out of sync".to_string()));
        }

        tx.mark_cancelled(booking_id).await?;
        tx.set_booked_seats(booked_seats).await?;
        tx.commit().await?;

        booking.status = crate::models::BookingStatus::Cancelled;
        info!(
            booking_id = %booking.id,
            user_id = %booking.user_id,
            event_id = %booking.event_id,
            seats = booking.seats,
            "Booking cancelled"
        );

        Ok(booking)
    }

    /// Бронь целиком: видна владельцу и администратору.
    pub async fn get_booking(&self, booking_id: &str, requester: &Requester) -> AppResult<Booking> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or(AppError::NotFound("Booking"))?;

        if booking.user_id != requester.user_id && requester.role != Role::Admin {
            return Err(AppError::Forbidden("view this booking"));
        }
        Ok(booking)
    }

    pub async fn list_bookings_for_user(&self, user_id: &str) -> AppResult<Vec<Booking>> {
        Ok(self.store.list_bookings(&BookingScope::User(user_id.to_string())).await?)
    }

    pub async fn list_bookings_for_event(&self, event_id: &str) -> AppResult<Vec<Booking>> {
        Ok(self.store.list_bookings(&BookingScope::Event(event_id.to_string())).await?)
    }

    pub async fn list_all_bookings(&self) -> AppResult<Vec<Booking>> {
        Ok(self.store.list_bookings(&BookingScope::All).await?)
    }

    /// Подтверждённые брони события (список участников).
    pub async fn list_attendees(&self, event_id: &str) -> AppResult<Vec<Booking>> {
        if self.store.find_event(event_id).await?.is_none() {
            return Err(AppError::NotFound("Event"));
        }
        Ok(self
            .store
            .list_bookings(&BookingScope::Attendees(event_id.to_string()))
            .await?)
    }

    /// Владельцы броней по user_id, для выдачи вместе с бронями.
    pub async fn owners_of(&self, bookings: &[Booking]) -> AppResult<HashMap<String, UserSummary>> {
        let mut ids: Vec<String> = bookings.iter().map(|b| b.user_id.clone()).collect();
        ids.sort();
        ids.dedup();

        let users = self.store.find_users(&ids).await?;
        Ok(users.into_iter().map(|u| (u.id.clone(), u)).collect())
    }
}
