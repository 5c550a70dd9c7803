use axum::{
    extract::{Path, State},
    routing::{delete, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use ridepool_domain::events::RideCancelledEvent;
use ridepool_domain::ride::{derived_status, CreateRideRequest, Ride, RideStatus, RideUpdate};
use ridepool_domain::user::UserProfile;
use ridepool_domain::DomainError;

use crate::error::AppError;
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/rides", post(create_ride))
        .route("/v1/rides/{id}", put(edit_ride))
        .route("/v1/rides/{id}", delete(cancel_ride))
}

fn validation(err: DomainError) -> AppError {
    match err {
        DomainError::ValidationError(msg) => AppError::ValidationError(msg),
        DomainError::InternalError(msg) => AppError::InternalServerError(msg),
    }
}

async fn create_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRideRequest>,
) -> Result<Json<Value>, AppError> {
    req.validate().map_err(validation)?;

    // Stored profile backs the driver-contact fallback; a token for a user
    // the store has never seen still works off the claim fields.
    let profile = state
        .users
        .get_user(claims.sub)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .unwrap_or(UserProfile {
            id: claims.sub,
            name: claims.name.clone(),
            email: claims.email.clone(),
            phone: claims.phone.clone(),
            rating: 5.0,
        });

    let driver = req.resolve_driver(&profile).map_err(validation)?;
    let seats = req.available_seats.unwrap_or_default();
    let now = Utc::now();
    let ride = Ride {
        id: Uuid::new_v4(),
        from_location: req.from_location.unwrap_or_default(),
        to_location: req.to_location.unwrap_or_default(),
        from_geo: req.from_geo,
        to_geo: req.to_geo,
        date: req.date.unwrap_or(now.date_naive()),
        time: req.time.unwrap_or_default(),
        total_seats: seats,
        available_seats: seats,
        price: req.price.unwrap_or_default(),
        driver,
        vehicle: req.vehicle,
        notes: req.notes,
        status: RideStatus::Active,
        created_at: now,
        updated_at: now,
    };

    state
        .rides
        .create_ride(&ride)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    info!("Ride published: {} by {}", ride.id, claims.sub);
    Ok(Json(json!({ "success": true, "ride": ride })))
}

pub async fn get_ride(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let ride = state
        .rides
        .get_ride(id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or(AppError::NotFoundOrUnauthorized)?;

    let display = derived_status(ride.status, ride.date, Utc::now().date_naive());
    Ok(Json(json!({
        "success": true,
        "ride": ride,
        "display_status": display,
    })))
}

pub(crate) async fn edit_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(update): Json<RideUpdate>,
) -> Result<Json<Value>, AppError> {
    if update.available_seats < 0 || update.available_seats > update.total_seats {
        return Err(AppError::ValidationError(
            "available_seats must be between 0 and total_seats".into(),
        ));
    }

    let ride = state
        .rides
        .update_ride(id, claims.sub, &update)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or(AppError::NotFoundOrUnauthorized)?;

    Ok(Json(json!({ "success": true, "ride": ride })))
}

async fn cancel_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let cancelled = state
        .rides
        .cancel_ride(id, claims.sub)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    if !cancelled {
        return Err(AppError::NotFoundOrUnauthorized);
    }

    let event = RideCancelledEvent {
        ride_id: id,
        driver_id: claims.sub,
        cancelled_at: Utc::now().timestamp(),
    };
    let _ = state
        .kafka
        .publish_event("ride.cancelled", &id.to_string(), &event)
        .await;

    info!("Ride cancelled: {} by {}", id, claims.sub);
    Ok(Json(json!({ "success": true })))
}
