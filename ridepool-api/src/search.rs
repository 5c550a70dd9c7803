use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use ridepool_domain::search::RideSearchQuery;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/rides/search", get(search_rides))
}

/// Availability-filtered, price-sorted search. An empty query is the
/// "browse all active rides" mode. Store failure yields the error envelope,
/// never partial results.
async fn search_rides(
    State(state): State<AppState>,
    Query(query): Query<RideSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let rides = state.rides.search_rides(&query).await.map_err(|e| {
        info!("Search failed: {}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(json!({ "success": true, "rides": rides })))
}
