use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two fixed parties of a ride's real-time session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Driver,
    Passenger,
}

impl Role {
    pub fn opposite(self) -> Role {
        match self {
            Role::Driver => Role::Passenger,
            Role::Passenger => Role::Driver,
        }
    }
}

/// Ephemeral position sample. Exists only while a tracking session is open;
/// never persisted, delivered at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveLocation {
    pub user_id: Uuid,
    pub ride_id: Uuid,
    pub role: Role,
    pub lat: f64,
    pub lng: f64,
    pub heading: Option<f64>,
    pub sent_at: DateTime<Utc>,
}
