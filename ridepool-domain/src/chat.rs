use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry in a ride's two-party chat thread, ordered by timestamp.
/// Chat is store-backed and replayable; location updates are not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}
