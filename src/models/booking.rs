use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub seats: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn confirmed(user_id: &str, event_id: &str, seats: i32) -> Self {
        Booking {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            seats,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

/// Какие бронирования выбирать в списке.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingScope {
    All,
    User(String),
    Event(String),
    // Только подтверждённые брони события (список участников)
    Attendees(String),
}

impl BookingScope {
    pub fn matches(&self, booking: &Booking) -> bool {
        match self {
            BookingScope::All => true,
            BookingScope::User(user_id) => &booking.user_id == user_id,
            BookingScope::Event(event_id) => &booking.event_id == event_id,
            BookingScope::Attendees(event_id) => {
                &booking.event_id == event_id && booking.is_confirmed()
            }
        }
    }
}

/// Сортировка "сначала новые"; при равном времени порядок по id стабилен.
pub fn newest_first(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
