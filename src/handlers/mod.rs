pub mod auth;
pub mod calendar;
pub mod catalog;
pub mod dashboard;
pub mod health;
pub mod sessions;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/catalog/specialties", get(catalog::get_specialties))
        .route("/api/catalog/hospitals", get(catalog::get_hospitals))
        .route("/api/sessions", post(sessions::create_session))
        .route("/api/sessions/:id", get(sessions::get_session))
        .route("/api/sessions/:id/actions", post(sessions::apply_action))
        .route("/api/sessions/:id/stream", get(sessions::events_stream))
        .route(
            "/api/sessions/:id/receipt.txt",
            get(sessions::download_receipt),
        )
        .route(
            "/api/sessions/:id/receipt.ics",
            get(sessions::download_calendar),
        )
        .route("/api/auth", post(auth::submit_form))
        .route("/api/auth/:id", get(auth::get_auth))
        .route("/api/auth/:id/digit", post(auth::enter_digit))
        .route("/api/auth/:id/backspace", post(auth::backspace))
        .route("/api/auth/:id/paste", post(auth::paste))
        .route("/api/auth/:id/verify", post(auth::verify))
        .route("/api/auth/:id/resend", post(auth::resend))
        .route("/api/auth/:id/change-phone", post(auth::change_phone))
        .route("/api/dashboard/bookings", get(dashboard::get_bookings))
        .route("/api/dashboard/stats", get(dashboard::get_stats))
        .route(
            "/api/dashboard/bookings/:id/complete",
            post(dashboard::complete_booking),
        )
        .route(
            "/api/dashboard/bookings/:id/cancel",
            post(dashboard::cancel_booking),
        )
        .route(
            "/calendar/:booking_id",
            get(calendar::download_ics),
        )
        .with_state(state)
}
