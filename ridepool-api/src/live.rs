use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error};
use uuid::Uuid;

use ridepool_domain::chat::ChatMessage;
use ridepool_domain::live::{LiveLocation, Role};

use crate::error::AppError;
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/rides/{id}/live", get(live_session))
}

/// Frames a session party may send. Mirrors the server frames in
/// `ridepool_hub::events`, minus the presence events only the hub emits.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClientFrame {
    LocationUpdate {
        lat: f64,
        lng: f64,
        heading: Option<f64>,
        timestamp: Option<DateTime<Utc>>,
    },
    SendMessage {
        text: String,
    },
    Typing {
        #[serde(default = "default_true")]
        is_typing: bool,
    },
    StopTyping,
}

fn default_true() -> bool {
    true
}

async fn live_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let ride = state
        .rides
        .get_ride(ride_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or(AppError::NotFoundOrUnauthorized)?;

    // The opposite party is identified from the stored driver id and the
    // booking row, never inferred from traffic.
    let role = if ride.driver.user_id == claims.sub {
        Role::Driver
    } else {
        let passenger = state
            .bookings
            .find_active_passenger(ride_id)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        match passenger {
            Some(p) if p.id == claims.sub => Role::Passenger,
            _ => return Err(AppError::NotFoundOrUnauthorized),
        }
    };

    let name = claims.name.clone();
    Ok(ws.on_upgrade(move |socket| run_session(socket, state, ride_id, claims.sub, name, role)))
}

async fn run_session(
    socket: WebSocket,
    state: AppState,
    ride_id: Uuid,
    user_id: Uuid,
    sender_name: String,
    role: Role,
) {
    let (token, mut hub_rx) = state.hub.join(ride_id, user_id, role).await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            event = hub_rx.recv() => {
                // None means a re-join from the same user took the slot;
                // the token makes the leave below a no-op in that case.
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, ride_id, user_id, &sender_name, role, text.as_str())
                            .await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.leave(ride_id, token).await;
}

async fn handle_frame(
    state: &AppState,
    ride_id: Uuid,
    user_id: Uuid,
    sender_name: &str,
    role: Role,
    raw: &str,
) {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("ignoring malformed frame on ride {}: {}", ride_id, e);
            return;
        }
    };

    match frame {
        ClientFrame::LocationUpdate { lat, lng, heading, timestamp } => {
            state
                .hub
                .relay_location(LiveLocation {
                    user_id,
                    ride_id,
                    role,
                    lat,
                    lng,
                    heading,
                    sent_at: timestamp.unwrap_or_else(Utc::now),
                })
                .await;
        }
        ClientFrame::SendMessage { text } => {
            let message = ChatMessage {
                id: Uuid::new_v4(),
                ride_id,
                sender_id: user_id,
                sender_name: sender_name.to_string(),
                text,
                sent_at: Utc::now(),
            };
            if let Err(e) = state.hub.relay_message(message).await {
                error!("Failed to persist chat message on ride {}: {}", ride_id, e);
            }
        }
        ClientFrame::Typing { is_typing } => {
            state.hub.relay_typing(ride_id, user_id, is_typing).await;
        }
        ClientFrame::StopTyping => {
            state.hub.relay_typing(ride_id, user_id, false).await;
        }
    }
}
