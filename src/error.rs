//! error.rs
//!
//! Типизированные ошибки сервисного слоя. Каждая ошибка несёт сообщение,
//! которое можно показать пользователю как есть.

use thiserror::Error;

use crate::services::lifecycle::EventStatus;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Cannot {action} {} event", .status.as_lowercase())]
    InvalidState {
        action: &'static str,
        status: EventStatus,
    },

    #[error("{0}")]
    Conflict(&'static str),

    #[error("You already have a booking for this event")]
    DuplicateBooking,

    #[error("Only {available} seat(s) available")]
    CapacityExceeded { available: i32 },

    #[error("Not authorized to {0}")]
    Forbidden(&'static str),

    #[error("Booking is already cancelled")]
    AlreadyCancelled,

    #[error("Event is busy, please retry")]
    Busy,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Только `Busy` имеет смысл повторять.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Busy)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Busy => AppError::Busy,
            // Уникальный индекс по подтверждённым броням сработал раньше нашей проверки
            StoreError::UniqueViolation(constraint) if constraint == "unique_user_event_booking" => {
                AppError::DuplicateBooking
            }
            StoreError::UniqueViolation(constraint) => {
                AppError::Internal(format!("unique constraint {} violated", constraint))
            }
            StoreError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
