use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::auth::AuthError;
use crate::services::controller::SessionError;
use crate::services::flow::FlowError;
use crate::services::receipt::ReceiptError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Receipt(#[from] ReceiptError),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(id) => AppError::NotFound(format!("session {id}")),
            SessionError::Flow(e) => AppError::Flow(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Flow(FlowError::InvalidPatientInfo(_) | FlowError::EmptyTranscript) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Flow(_) => StatusCode::CONFLICT,
            AppError::Auth(AuthError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Auth(
                AuthError::InvalidForm(_) | AuthError::IncompleteCode | AuthError::IncorrectCode,
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Auth(AuthError::Backend(_)) => StatusCode::BAD_GATEWAY,
            AppError::Auth(_) => StatusCode::CONFLICT,
            AppError::Receipt(_) => StatusCode::CONFLICT,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = serde_json::json!({ "error": self.to_string() });
        match &self {
            AppError::Flow(FlowError::InvalidPatientInfo(e)) => {
                body["field"] = serde_json::json!(e.field);
            }
            AppError::Auth(AuthError::InvalidForm(errors)) => {
                body["fields"] = serde_json::json!(errors);
            }
            _ => {}
        }

        (status, axum::Json(body)).into_response()
    }
}
