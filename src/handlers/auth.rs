use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::AuthForm;
use crate::services::auth::AuthSession;
use crate::state::AppState;

type AuthResult = Result<Json<AuthSession>, AppError>;

// POST /api/auth
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Json(form): Json<AuthForm>,
) -> Result<(StatusCode, Json<AuthSession>), AppError> {
    let session = state.auth.submit(form).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

// GET /api/auth/:id
pub async fn get_auth(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> AuthResult {
    Ok(Json(state.auth.get(&id)?))
}

#[derive(Deserialize)]
pub struct DigitRequest {
    pub index: usize,
    pub value: char,
}

// POST /api/auth/:id/digit
pub async fn enter_digit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<DigitRequest>,
) -> AuthResult {
    Ok(Json(state.auth.enter_digit(&id, req.index, req.value).await?))
}

#[derive(Deserialize)]
pub struct BackspaceRequest {
    pub index: usize,
}

// POST /api/auth/:id/backspace
pub async fn backspace(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<BackspaceRequest>,
) -> AuthResult {
    Ok(Json(state.auth.backspace(&id, req.index)?))
}

#[derive(Deserialize)]
pub struct PasteRequest {
    pub text: String,
}

// POST /api/auth/:id/paste
pub async fn paste(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PasteRequest>,
) -> AuthResult {
    Ok(Json(state.auth.paste(&id, &req.text).await?))
}

// POST /api/auth/:id/verify
pub async fn verify(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> AuthResult {
    Ok(Json(state.auth.verify(&id).await?))
}

// POST /api/auth/:id/resend
pub async fn resend(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> AuthResult {
    Ok(Json(state.auth.resend(&id).await?))
}

// POST /api/auth/:id/change-phone
pub async fn change_phone(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> AuthResult {
    Ok(Json(state.auth.change_phone(&id)?))
}
