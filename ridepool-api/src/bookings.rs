use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use ridepool_domain::booking::{
    check_bookable, Booking, BookingCandidate, BookingConflict, SeatCommit,
};
use ridepool_domain::events::RideBookedEvent;
use ridepool_domain::ride::derived_status;

use crate::error::AppError;
use crate::middleware::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateBookingRequest {
    pub(crate) ride_id: Uuid,
    /// Makes retries safe: a replayed key never decrements seats twice.
    pub(crate) idempotency_key: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(commit_booking))
        .route("/v1/bookings", get(list_bookings))
}

pub(crate) async fn commit_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let idempotency_key = req
        .idempotency_key
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // 1. Claim the attempt. A replay short-circuits before any decrement.
    let claimed = state
        .attempts
        .claim_attempt(
            &idempotency_key,
            &claims.sub.to_string(),
            state.business_rules.booking_idempotency_seconds,
        )
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    if !claimed {
        info!("Duplicate booking attempt ignored: key={}", idempotency_key);
        return Ok(Json(json!({
            "success": true,
            "message": "duplicate booking attempt ignored",
            "idempotency_key": idempotency_key,
        })));
    }

    // Any rejection below releases the claim so the client may retry with
    // the same key.
    let release = |state: AppState, key: String| async move {
        if let Err(e) = state.attempts.release_attempt(&key).await {
            tracing::warn!("Failed to release booking claim {}: {}", key, e);
        }
    };

    // 2. Authoritative re-validation against current store state.
    let ride = match state.rides.get_ride(req.ride_id).await {
        Ok(Some(ride)) => ride,
        Ok(None) => {
            release(state.clone(), idempotency_key).await;
            return Err(AppError::NotFoundOrUnauthorized);
        }
        Err(e) => {
            release(state.clone(), idempotency_key).await;
            return Err(AppError::InternalServerError(e.to_string()));
        }
    };

    let existing = match state.bookings.booked_rides(claims.sub).await {
        Ok(existing) => existing,
        Err(e) => {
            release(state.clone(), idempotency_key).await;
            return Err(AppError::InternalServerError(e.to_string()));
        }
    };

    let candidate = BookingCandidate {
        ride_id: ride.id,
        departure_at: ride.departure_instant(),
        available_seats: ride.available_seats,
    };
    if let Err(conflict) = check_bookable(&candidate, &existing) {
        release(state.clone(), idempotency_key).await;
        return Err(AppError::Conflict(conflict));
    }

    // 3. Transactional decrement-and-insert; losing the race for the last
    // seat surfaces as RideFull here even though the check above passed,
    // and a racing duplicate rolls the seat back instead of leaking it.
    let booking = Booking {
        id: Uuid::new_v4(),
        ride_id: ride.id,
        passenger_id: claims.sub,
        idempotency_key: idempotency_key.clone(),
        created_at: Utc::now(),
    };
    let reserved = match state.bookings.commit_booking(&booking).await {
        Ok(SeatCommit::Confirmed(reserved)) => reserved,
        Ok(SeatCommit::Full) => {
            release(state.clone(), idempotency_key).await;
            return Err(AppError::Conflict(BookingConflict::RideFull));
        }
        Ok(SeatCommit::Duplicate) => {
            release(state.clone(), idempotency_key).await;
            return Err(AppError::Conflict(BookingConflict::AlreadyBooked));
        }
        Err(e) => {
            release(state.clone(), idempotency_key).await;
            return Err(AppError::InternalServerError(e.to_string()));
        }
    };

    let event = RideBookedEvent {
        ride_id: ride.id,
        booking_id: booking.id,
        passenger_id: claims.sub,
        seats_remaining: reserved.available_seats,
        booked_at: booking.created_at.timestamp(),
    };
    let _ = state
        .kafka
        .publish_event("ride.booked", &ride.id.to_string(), &event)
        .await;

    info!("Booking confirmed: {} on ride {}", booking.id, ride.id);
    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "ride": reserved,
    })))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, AppError> {
    let rows = state
        .bookings
        .list_user_bookings(claims.sub)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let today = Utc::now().date_naive();
    let bookings: Vec<Value> = rows
        .into_iter()
        .map(|(booking, ride)| {
            let display = derived_status(ride.status, ride.date, today);
            json!({
                "booking": booking,
                "ride": ride,
                "display_status": display,
            })
        })
        .collect();

    Ok(Json(json!({ "success": true, "bookings": bookings })))
}
