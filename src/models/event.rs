use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::services::lifecycle::{self, EventStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_category")]
pub enum EventCategory {
    Music,
    Tech,
    Business,
    Sports,
    Arts,
    Education,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "location_type")]
pub enum LocationType {
    Online,
    #[serde(rename = "In-Person")]
    #[sqlx(rename = "In-Person")]
    InPerson,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    // Публичный код вида EVT-OCT2026-X7K
    pub event_code: String,
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub location: String,
    pub location_type: LocationType,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    // Пишет только SeatLedger
    pub booked_seats: i32,
    pub image_url: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn available_seats(&self) -> i32 {
        self.capacity - self.booked_seats
    }

    pub fn status_on(&self, today: NaiveDate) -> EventStatus {
        lifecycle::classify(self.event_date, today)
    }

    /// Дата в формате 30-Jul-2025
    pub fn formatted_date(&self) -> String {
        self.event_date.format("%d-%b-%Y").to_string()
    }

    pub fn view(self, today: NaiveDate) -> EventView {
        EventView {
            status: self.status_on(today),
            available_seats: self.available_seats(),
            formatted_date: self.formatted_date(),
            event: self,
        }
    }
}

/// Событие с вычисляемыми полями для ответа клиенту.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub status: EventStatus,
    pub available_seats: i32,
    pub formatted_date: String,
}

/// Фильтры списка событий. Границы дат включительные.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    pub category: Option<EventCategory>,
    pub location_type: Option<LocationType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<EventStatus>,
}

impl EventFilter {
    // Статус не хранится в БД, поэтому проверяется отдельно после выборки
    pub fn matches_stored(&self, event: &Event) -> bool {
        self.category.map_or(true, |c| event.category == c)
            && self.location_type.map_or(true, |l| event.location_type == l)
            && self.start_date.map_or(true, |d| event.event_date >= d)
            && self.end_date.map_or(true, |d| event.event_date <= d)
    }
}
