use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/rides/{id}/chat", get(chat_history))
}

/// Replayable chat log for a ride, readable only by its two parties.
async fn chat_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let ride = state
        .rides
        .get_ride(ride_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or(AppError::NotFoundOrUnauthorized)?;

    let is_driver = ride.driver.user_id == claims.sub;
    let is_passenger = if is_driver {
        false
    } else {
        state
            .bookings
            .find_active_passenger(ride_id)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
            .is_some_and(|p| p.id == claims.sub)
    };
    if !is_driver && !is_passenger {
        return Err(AppError::NotFoundOrUnauthorized);
    }

    let messages = state
        .chat
        .ride_history(ride_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(json!({ "success": true, "messages": messages })))
}
