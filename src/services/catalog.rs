//! catalog.rs
//!
//! Управление событиями для администраторов: создание, изменение, удаление,
//! просмотр и фильтрация. Изменения существующего события идут под той же
//! блокировкой события, что и у SeatLedger, и никогда не пишут `booked_seats`.

use chrono::{NaiveDate, NaiveTime, Utc};
use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, AppResult};
use crate::models::{Event, EventCategory, EventFilter, EventView, LocationType};
use crate::services::lifecycle::{Clock, SystemClock};
use crate::storage::{EventTx, LedgerStore, StoreError};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
// Коллизия трёх случайных символов в пределах месяца маловероятна, но возможна
const CODE_ATTEMPTS: usize = 5;

/// Код события вида EVT-OCT2026-X7K.
pub fn generate_event_code<R: Rng + ?Sized>(event_date: NaiveDate, rng: &mut R) -> String {
    use chrono::Datelike;

    let suffix: String = (0..3)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!(
        "EVT-{}{}-{}",
        MONTHS[event_date.month0() as usize],
        event_date.year(),
        suffix
    )
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub category: EventCategory,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
    pub location_type: LocationType,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: i32,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

/// Частичное изменение события; отсутствующие поля не меняются.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: Option<String>,
    pub category: Option<EventCategory>,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: Option<String>,
    pub location_type: Option<LocationType>,
    pub event_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: Option<i32>,
    // Some(None) убирает картинку
    #[serde(default, with = "double_option")]
    pub image_url: Option<Option<String>>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Первое сообщение из ошибок валидатора.
pub fn first_validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Please provide all required fields".to_string())
}

fn check_times(start: NaiveTime, end: NaiveTime) -> AppResult<()> {
    if end <= start {
        return Err(AppError::Validation("End time must be after start time".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct EventCatalog<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: LedgerStore, C: Clock> EventCatalog<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub async fn create_event(&self, new: NewEvent, created_by: &str) -> AppResult<EventView> {
        new.validate()
            .map_err(|e| AppError::Validation(first_validation_message(&e)))?;
        check_times(new.start_time, new.end_time)?;

        let now = Utc::now();
        let mut event = Event {
            id: Uuid::new_v4().to_string(),
            event_code: String::new(),
            title: new.title,
            description: new.description,
            category: new.category,
            location: new.location,
            location_type: new.location_type,
            event_date: new.event_date,
            start_time: new.start_time,
            end_time: new.end_time,
            capacity: new.capacity,
            booked_seats: 0,
            image_url: new.image_url,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        };

        for attempt in 1..=CODE_ATTEMPTS {
            event.event_code = generate_event_code(event.event_date, &mut rand::rng());
            match self.store.insert_event(&event).await {
                Ok(()) => {
                    info!("Event {} ({}) created by {}", event.event_code, event.id, created_by);
                    return Ok(event.view(self.clock.today()));
                }
                Err(StoreError::UniqueViolation(c)) if c == "events_event_code_key" => {
                    warn!("Event code {} already taken (attempt {})", event.event_code, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal("could not allocate a unique event code".to_string()))
    }

    pub async fn update_event(&self, event_id: &str, patch: EventPatch) -> AppResult<EventView> {
        patch
            .validate()
            .map_err(|e| AppError::Validation(first_validation_message(&e)))?;

        let mut tx = self
            .store
            .lock_event(event_id)
            .await?
            .ok_or(AppError::NotFound("Event"))?;

        let current = tx.event().clone();
        let updated = Event {
            title: patch.title.unwrap_or(current.title.clone()),
            description: patch.description.unwrap_or(current.description.clone()),
            category: patch.category.unwrap_or(current.category),
            location: patch.location.unwrap_or(current.location.clone()),
            location_type: patch.location_type.unwrap_or(current.location_type),
            event_date: patch.event_date.unwrap_or(current.event_date),
            start_time: patch.start_time.unwrap_or(current.start_time),
            end_time: patch.end_time.unwrap_or(current.end_time),
            capacity: patch.capacity.unwrap_or(current.capacity),
            image_url: patch.image_url.unwrap_or(current.image_url.clone()),
            updated_at: Utc::now(),
            ..current.clone()
        };

        check_times(updated.start_time, updated.end_time)?;
        if updated.capacity < current.booked_seats {
            return Err(AppError::Validation(format!(
                "Capacity cannot be lower than the {} seat(s) already booked",
                current.booked_seats
            )));
        }

        tx.update_details(&updated).await?;
        let event = tx.event().clone();
        tx.commit().await?;

        info!("Event {} updated", event.id);
        Ok(event.view(self.clock.today()))
    }

    /// Удалить событие. Брони не удаляются никогда, поэтому событие с
    /// бронями удалить нельзя.
    pub async fn delete_event(&self, event_id: &str) -> AppResult<()> {
        let mut tx = self
            .store
            .lock_event(event_id)
            .await?
            .ok_or(AppError::NotFound("Event"))?;

        if tx.count_bookings().await? > 0 {
            return Err(AppError::Conflict("Cannot delete an event that has bookings"));
        }

        tx.delete_event().await?;
        tx.commit().await?;

        info!("Event {} deleted", event_id);
        Ok(())
    }

    pub async fn get_event(&self, event_id: &str) -> AppResult<EventView> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or(AppError::NotFound("Event"))?;
        Ok(event.view(self.clock.today()))
    }

    pub async fn list_events(&self, filter: &EventFilter) -> AppResult<Vec<EventView>> {
        let today = self.clock.today();
        let events = self.store.list_events(filter).await?;

        Ok(events
            .into_iter()
            .map(|e| e.view(today))
            .filter(|v| filter.status.map_or(true, |s| v.status == s))
            .collect())
    }
}
