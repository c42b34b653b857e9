use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use crate::{
    controllers::{ApiJson, ApiPath},
    error::{AppError, AppResult},
    middleware::{AdminUser, AuthUser},
    models::{Booking, EventView, UserSummary},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking).get(get_all_bookings))
        .route("/bookings/my-bookings", get(get_my_bookings))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", put(cancel_booking))
}

/* ---------- helpers ---------- */

/// Бронь вместе с событием и владельцем.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub event: Option<EventView>,
    pub user: Option<UserSummary>,
}

/// Склеить брони с уже загруженными событиями и пользователями.
pub fn join_details(
    bookings: Vec<Booking>,
    events: &HashMap<String, EventView>,
    users: &HashMap<String, UserSummary>,
) -> Vec<BookingDetails> {
    bookings
        .into_iter()
        .map(|booking| BookingDetails {
            event: events.get(&booking.event_id).cloned(),
            user: users.get(&booking.user_id).cloned(),
            booking,
        })
        .collect()
}

pub async fn with_details(state: &AppState, bookings: Vec<Booking>) -> AppResult<Vec<BookingDetails>> {
    let mut events: HashMap<String, EventView> = HashMap::new();
    for booking in &bookings {
        if events.contains_key(&booking.event_id) {
            continue;
        }
        match state.catalog.get_event(&booking.event_id).await {
            Ok(view) => {
                events.insert(booking.event_id.clone(), view);
            }
            Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    let users = state.ledger.owners_of(&bookings).await?;

    Ok(join_details(bookings, &events, &users))
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    event_id: Option<String>,
    seats: Option<i32>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    let (Some(event_id), Some(seats)) = (req.event_id, req.seats) else {
        return Err(AppError::Validation(
            "Please provide event ID and number of seats".to_string(),
        ));
    };

    let booking = state.ledger.create_booking(&user.user_id, &event_id, seats).await?;
    tracing::info!("Booking {} made by {} <{}>", booking.id, user.name, user.email);

    let data = with_details(&state, vec![booking]).await?.pop();
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Booking created successfully",
            "data": data
        })),
    ))
}

// GET /api/bookings/my-bookings
async fn get_my_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let bookings = state.ledger.list_bookings_for_user(&user.user_id).await?;
    let data = with_details(&state, bookings).await?;

    Ok(Json(json!({ "success": true, "count": data.len(), "data": data })))
}

// GET /api/bookings/{id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<impl IntoResponse> {
    let booking = state.ledger.get_booking(&id, &user.requester()).await?;
    let data = with_details(&state, vec![booking]).await?.pop();

    Ok(Json(json!({ "success": true, "data": data })))
}

// PUT /api/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<impl IntoResponse> {
    let booking = state.ledger.cancel_booking(&id, &user.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Booking cancelled successfully",
        "data": booking
    })))
}

// GET /api/bookings (admin)
async fn get_all_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<impl IntoResponse> {
    let bookings = state.ledger.list_all_bookings().await?;
    let data = with_details(&state, bookings).await?;

    Ok(Json(json!({ "success": true, "count": data.len(), "data": data })))
}
