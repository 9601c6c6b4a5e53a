use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, DashboardStats};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/dashboard/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    transaction_id: String,
    patient_name: String,
    patient_age: u32,
    patient_phone: String,
    doctor: String,
    specialty: String,
    clinic: String,
    date: String,
    time: String,
    duration_minutes: i32,
    total_paid: u32,
    symptoms: Vec<String>,
    notes: Option<String>,
    status: String,
    calendar_url: String,
    created_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            calendar_url: format!("/calendar/{}.ics", b.id),
            id: b.id,
            transaction_id: b.transaction_id,
            patient_name: b.patient_name,
            patient_age: b.patient_age,
            patient_phone: b.patient_phone,
            doctor: b.doctor,
            specialty: b.specialty,
            clinic: b.clinic,
            date: b.starts_at.format("%Y-%m-%d").to_string(),
            time: b.starts_at.format("%-I:%M %p").to_string(),
            duration_minutes: b.duration_minutes,
            total_paid: b.total_paid,
            symptoms: b.symptoms,
            notes: b.notes,
            status: b.status.as_str().to_string(),
            created_at: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50);
    let status_filter = query.status.as_deref().map(BookingStatus::parse);

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::get_all_bookings(&db, status_filter.as_ref(), limit)?
    };

    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

// GET /api/dashboard/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = Utc::now().naive_utc();
    let db = state.db.lock().unwrap();
    Ok(Json(queries::get_dashboard_stats(&db, &now)?))
}

// POST /api/dashboard/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    set_status(&state, &id, BookingStatus::Completed)
}

// POST /api/dashboard/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    set_status(&state, &id, BookingStatus::Cancelled)
}

fn set_status(
    state: &AppState,
    id: &str,
    status: BookingStatus,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = {
        let db = state.db.lock().unwrap();
        queries::update_booking_status(&db, id, &status)?
    };

    if !updated {
        return Err(AppError::NotFound("booking not found".into()));
    }
    tracing::info!(booking_id = %id, status = status.as_str(), "booking status changed");
    Ok(Json(serde_json::json!({"ok": true, "status": status.as_str()})))
}
