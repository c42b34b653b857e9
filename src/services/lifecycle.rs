//! lifecycle.rs
//!
//! Классификация события по дате: Upcoming / Ongoing / Completed.
//! Сравниваются только календарные даты, время суток не учитывается.
//! "Сегодня" всегда вычисляется в одном каноническом смещении от UTC,
//! а не в часовом поясе клиента.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Completed,
}

impl EventStatus {
    /// Бронировать и отменять можно только до дня события.
    pub fn accepts_changes(self) -> bool {
        self == EventStatus::Upcoming
    }

    pub fn as_lowercase(self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::Ongoing => "ongoing",
            EventStatus::Completed => "completed",
        }
    }
}

pub fn classify(event_date: NaiveDate, today: NaiveDate) -> EventStatus {
    use std::cmp::Ordering;

    match event_date.cmp(&today) {
        Ordering::Greater => EventStatus::Upcoming,
        Ordering::Equal => EventStatus::Ongoing,
        Ordering::Less => EventStatus::Completed,
    }
}

/// Вариант для момента времени: время суток отбрасывается.
pub fn classify_at(event_date: NaiveDate, now: NaiveDateTime) -> EventStatus {
    classify(event_date, now.date())
}

/// Источник текущей даты.
pub trait Clock: Send + Sync + 'static {
    fn today(&self) -> NaiveDate;
}

/// Системные часы в каноническом смещении.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Смещение в минутах; некорректное значение (больше суток) сводится к UTC.
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes.saturating_mul(60))
            .unwrap_or_else(|| {
                tracing::warn!("Invalid UTC offset {} minutes, falling back to UTC", minutes);
                Utc.fix()
            });
        Self::new(offset)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::from_offset_minutes(0)
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Часы с зафиксированной датой, для тестов и сидов.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
