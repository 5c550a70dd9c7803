use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use ridepool_domain::booking::BookingConflict;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    ValidationError(String),
    /// Deliberately collapses "doesn't exist" and "not yours" so an edit
    /// attempt cannot learn whether a ride id is real.
    NotFoundOrUnauthorized,
    Conflict(BookingConflict),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, reason, message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, None, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, None, msg),
            AppError::NotFoundOrUnauthorized => (
                StatusCode::NOT_FOUND,
                None,
                "ride not found or not owned by you".to_string(),
            ),
            AppError::Conflict(conflict) => (
                StatusCode::CONFLICT,
                Some(conflict.reason()),
                conflict.to_string(),
            ),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let mut body = json!({
            "success": false,
            "message": message,
        });
        if let Some(reason) = reason {
            body["reason"] = json!(reason);
        }

        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
