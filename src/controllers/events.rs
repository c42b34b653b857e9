use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use crate::{
    controllers::{bookings::with_details, ApiJson, ApiPath, ApiQuery},
    error::AppResult,
    middleware::AdminUser,
    models::EventFilter,
    services::catalog::{EventPatch, NewEvent},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/{id}", get(get_event).put(update_event).delete(delete_event))
        .route("/events/{id}/attendees", get(get_event_attendees))
        .route("/events/{id}/bookings", get(get_event_bookings))
}

// GET /api/events?category=&locationType=&startDate=&endDate=&status=
async fn list_events(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<EventFilter>,
) -> AppResult<impl IntoResponse> {
    let events = state.catalog.list_events(&filter).await?;
    Ok(Json(json!({ "success": true, "count": events.len(), "data": events })))
}

// GET /api/events/{id}
async fn get_event(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<impl IntoResponse> {
    let event = state.catalog.get_event(&id).await?;
    Ok(Json(json!({ "success": true, "data": event })))
}

// POST /api/events (admin)
async fn create_event(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ApiJson(new): ApiJson<NewEvent>,
) -> AppResult<impl IntoResponse> {
    let event = state.catalog.create_event(new, &admin.user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Event created successfully",
            "data": event
        })),
    ))
}

// PUT /api/events/{id} (admin)
async fn update_event(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(patch): ApiJson<EventPatch>,
) -> AppResult<impl IntoResponse> {
    let event = state.catalog.update_event(&id, patch).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Event updated successfully",
        "data": event
    })))
}

// DELETE /api/events/{id} (admin)
async fn delete_event(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<impl IntoResponse> {
    state.catalog.delete_event(&id).await?;
    Ok(Json(json!({ "success": true, "message": "Event deleted successfully" })))
}

// GET /api/events/{id}/attendees (admin)
async fn get_event_attendees(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<impl IntoResponse> {
    let bookings = state.ledger.list_attendees(&id).await?;
    let data = with_details(&state, bookings).await?;
    Ok(Json(json!({ "success": true, "count": data.len(), "data": data })))
}

// GET /api/events/{id}/bookings (admin)
async fn get_event_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<impl IntoResponse> {
    // 404 для несуществующего события, а не пустой список
    state.catalog.get_event(&id).await?;
    let bookings = state.ledger.list_bookings_for_event(&id).await?;
    let data = with_details(&state, bookings).await?;
    Ok(Json(json!({ "success": true, "count": data.len(), "data": data })))
}
