use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ridepool_domain::chat::ChatMessage;
use ridepool_domain::live::{LiveLocation, Role};

/// Frames delivered to a session party. Location and typing are transient;
/// messages are also durably appended to the ride's chat log before relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HubEvent {
    LocationUpdate { location: LiveLocation },
    NewMessage { message: ChatMessage },
    Typing { sender_id: Uuid, is_typing: bool },
    PeerJoined { user_id: Uuid, role: Role },
    PeerLeft { user_id: Uuid, role: Role },
}
