use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use ridepool_domain::user::UserProfile;

use crate::error::AppError;
use crate::middleware::auth::Claims;
use crate::state::AppState;

/// Development stand-in for the external identity provider: mints a token
/// and seeds the matching profile row so driver-contact fallback works.
#[derive(Debug, Default, Deserialize)]
struct GuestLoginRequest {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/guest", post(login_guest))
}

async fn login_guest(
    State(state): State<AppState>,
    body: Option<Json<GuestLoginRequest>>,
) -> Result<Json<Value>, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();

    let user_id = Uuid::new_v4();
    let profile = UserProfile {
        id: user_id,
        name: req
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("guest-{}", &user_id.to_string()[..8])),
        email: req.email,
        phone: req.phone,
        rating: 5.0,
    };

    state
        .users
        .ensure_user(&profile)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let claims = Claims {
        sub: profile.id,
        name: profile.name.clone(),
        email: profile.email.clone(),
        phone: profile.phone.clone(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    Ok(Json(json!({
        "success": true,
        "token": token,
        "user": profile,
    })))
}
