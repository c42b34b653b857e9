//! seed.rs
//!
//! Демо-данные: администратор, тестовый пользователь и пара событий.
//! Запускается только при `SEED_DEMO_DATA=true` и ничего не перезаписывает.

use chrono::{Duration, NaiveTime};
use tracing::info;
use uuid::Uuid;

use crate::models::{EventCategory, EventFilter, LocationType, Role, User};
use crate::services::catalog::NewEvent;
use crate::services::lifecycle::Clock;
use crate::AppState;

const DEMO_USERS: &[(&str, &str, &str, Role)] = &[
    ("Admin User", "admin@gmail.com", "admin123", Role::Admin),
    ("Test User", "user@gmail.com", "user123", Role::User),
];

pub async fn seed_demo_data(state: &AppState) -> anyhow::Result<()> {
    let mut admin_id = None;

    for (name, email, password, role) in DEMO_USERS {
        if let Some(existing) = User::find_by_email(email, &state.db).await? {
            info!("ℹ️  User {} already exists", email);
            if existing.is_admin() {
                admin_id.get_or_insert(existing.id);
            }
            continue;
        }

        let id = Uuid::new_v4().to_string();
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
        sqlx::query("INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, $4, $5)")
            .bind(&id)
            .bind(*name)
            .bind(*email)
            .bind(&hash)
            .bind(*role)
            .execute(&state.db.pool)
            .await?;
        info!("✅ User created: {} ({:?})", email, role);

        if *role == Role::Admin {
            admin_id.get_or_insert(id);
        }
    }

    let Some(admin_id) = admin_id else {
        return Ok(());
    };

    if !state.catalog.list_events(&EventFilter::default()).await?.is_empty() {
        return Ok(());
    }

    let today = state.ledger.clock().today();
    let samples = [
        ("Rust Systems Meetup", EventCategory::Tech, LocationType::InPerson, "Tech Hub, Hall A", 14, 40),
        ("Jazz in the Park", EventCategory::Music, LocationType::InPerson, "Central Park", 30, 120),
        ("Startup Pitch Online", EventCategory::Business, LocationType::Online, "Zoom", 7, 200),
    ];

    for (title, category, location_type, location, days_ahead, capacity) in samples {
        let new = NewEvent {
            title: title.to_string(),
            description: format!("Demo event: {}", title),
            category,
            location: location.to_string(),
            location_type,
            event_date: today + Duration::days(days_ahead),
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or_default(),
            capacity,
            image_url: None,
        };
        let view = state.catalog.create_event(new, &admin_id).await?;
        info!("✅ Demo event created: {} ({})", view.event.title, view.event.event_code);
    }

    Ok(())
}
