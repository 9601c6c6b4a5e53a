use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::handlers::calendar::calendar_attachment;
use crate::models::BookingSession;
use crate::services::calendar::generate_ics;
use crate::services::controller::SessionView;
use crate::services::flow::UserAction;
use crate::services::receipt::{confirmed_booking, render_receipt};
use crate::state::AppState;

// POST /api/sessions
pub async fn create_session(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SessionView>) {
    let session = state.sessions.create();
    (StatusCode::CREATED, Json(session.into()))
}

// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.get(&id)?.into()))
}

// POST /api/sessions/:id/actions
pub async fn apply_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(action): Json<UserAction>,
) -> Result<Json<SessionView>, AppError> {
    let name = action.name();
    let session = state.sessions.dispatch(&id, action.into()).map_err(|e| {
        tracing::info!(session_id = %id, action = name, error = %e, "action rejected");
        e
    })?;
    Ok(Json(session.into()))
}

fn session_event(session: BookingSession) -> Event {
    let data = serde_json::to_string(&SessionView::from(session)).unwrap_or_default();
    Event::default().data(data).event("session")
}

// GET /api/sessions/:id/stream
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Subscribe before reading the snapshot so nothing falls in between.
    let rx = state.sessions.subscribe();
    let current = state.sessions.get(&id)?;

    let snapshot = tokio_stream::once(Ok::<_, Infallible>(session_event(current)));

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(session) if session.id == id => Some(Ok(session_event(session))),
        Ok(_) => None,
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    let combined = snapshot.chain(live_stream);
    let merged = StreamExt::merge(combined, keepalive_stream);

    Ok(Sse::new(merged))
}

// GET /api/sessions/:id/receipt.txt
pub async fn download_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let booking = confirmed_booking(&state.sessions.get(&id)?)?;
    let filename = format!("arogya-receipt-{}.txt", booking.transaction_id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        render_receipt(&booking),
    )
        .into_response())
}

// GET /api/sessions/:id/receipt.ics
pub async fn download_calendar(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let booking = confirmed_booking(&state.sessions.get(&id)?)?;
    Ok(calendar_attachment(
        &format!("arogya-appointment-{}.ics", booking.transaction_id),
        generate_ics(&booking),
    ))
}
