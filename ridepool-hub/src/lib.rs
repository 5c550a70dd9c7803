//! Per-ride two-party session registry. Relays location, chat, and typing
//! events between exactly the ride's driver and its active passenger over
//! transport-agnostic send handles. Location and typing are best-effort and
//! at-most-once; chat is durably appended before relay.

pub mod events;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

use ridepool_domain::chat::ChatMessage;
use ridepool_domain::live::{LiveLocation, Role};
use ridepool_domain::repository::{ChatRepository, RepoError};

pub use events::HubEvent;

/// A dropped "stop typing" frame must not leave the indicator stuck.
pub const TYPING_CLEAR_SECONDS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    WaitingForPeer,
    Paired,
}

struct Slot {
    /// Identifies this registration, not the user: a re-join mints a new
    /// token, so a stale connection's leave cannot evict its successor.
    token: Uuid,
    user_id: Uuid,
    tx: mpsc::UnboundedSender<HubEvent>,
    /// Bumped on every typing frame aimed at this slot; disarms stale
    /// auto-clear timers.
    typing_gen: u64,
}

#[derive(Default)]
struct Session {
    driver: Option<Slot>,
    passenger: Option<Slot>,
}

impl Session {
    fn slot(&self, role: Role) -> &Option<Slot> {
        match role {
            Role::Driver => &self.driver,
            Role::Passenger => &self.passenger,
        }
    }

    fn slot_mut(&mut self, role: Role) -> &mut Option<Slot> {
        match role {
            Role::Driver => &mut self.driver,
            Role::Passenger => &mut self.passenger,
        }
    }

    fn role_of(&self, user_id: Uuid) -> Option<Role> {
        if self.driver.as_ref().is_some_and(|s| s.user_id == user_id) {
            Some(Role::Driver)
        } else if self.passenger.as_ref().is_some_and(|s| s.user_id == user_id) {
            Some(Role::Passenger)
        } else {
            None
        }
    }

    fn is_empty(&self) -> bool {
        self.driver.is_none() && self.passenger.is_none()
    }
}

pub struct CoordinationHub {
    sessions: Mutex<HashMap<Uuid, Session>>,
    chat_log: Arc<dyn ChatRepository>,
}

impl CoordinationHub {
    pub fn new(chat_log: Arc<dyn ChatRepository>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            chat_log,
        })
    }

    /// Occupy a slot. A re-join for the same role replaces the stale
    /// registration. The peer, if present, is told; the joiner hears nothing
    /// about itself. The returned token names this registration and is what
    /// [`leave`](Self::leave) takes.
    pub async fn join(
        &self,
        ride_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> (Uuid, mpsc::UnboundedReceiver<HubEvent>) {
        let token = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(ride_id).or_default();
        *session.slot_mut(role) = Some(Slot {
            token,
            user_id,
            tx,
            typing_gen: 0,
        });
        if let Some(peer) = session.slot(role.opposite()) {
            let _ = peer.tx.send(HubEvent::PeerJoined { user_id, role });
        }
        debug!("hub join: ride={} user={} role={:?}", ride_id, user_id, role);
        (token, rx)
    }

    /// Free the slot registered under `token`. A token whose slot was since
    /// re-joined no longer matches and the call is a no-op, so a dying
    /// connection never evicts its successor. The remaining party, if any,
    /// is notified; later relays aimed at the freed slot are silently
    /// dropped.
    pub async fn leave(&self, ride_id: Uuid, token: Uuid) {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&ride_id) else {
            return;
        };
        let role = if session.driver.as_ref().is_some_and(|s| s.token == token) {
            Role::Driver
        } else if session.passenger.as_ref().is_some_and(|s| s.token == token) {
            Role::Passenger
        } else {
            return;
        };
        let Some(slot) = session.slot_mut(role).take() else {
            return;
        };
        if let Some(peer) = session.slot(role.opposite()) {
            let _ = peer.tx.send(HubEvent::PeerLeft {
                user_id: slot.user_id,
                role,
            });
        }
        if session.is_empty() {
            sessions.remove(&ride_id);
        }
        debug!("hub leave: ride={} user={}", ride_id, slot.user_id);
    }

    pub async fn session_state(&self, ride_id: Uuid) -> SessionState {
        let sessions = self.sessions.lock().await;
        match sessions.get(&ride_id) {
            None => SessionState::Idle,
            Some(s) if s.driver.is_some() && s.passenger.is_some() => SessionState::Paired,
            Some(s) if s.is_empty() => SessionState::Idle,
            Some(_) => SessionState::WaitingForPeer,
        }
    }

    /// Forward a position sample to the opposite slot. No queueing and no
    /// persistence: an absent peer means the sample is gone.
    pub async fn relay_location(&self, location: LiveLocation) {
        let sessions = self.sessions.lock().await;
        let Some((_, peer)) = resolve_peer(&sessions, location.ride_id, location.user_id) else {
            debug!("location dropped: ride={} no peer", location.ride_id);
            return;
        };
        let _ = peer.tx.send(HubEvent::LocationUpdate { location });
    }

    /// Append to the durable chat log, then forward if the peer is present.
    /// The append happens regardless of delivery so the message is
    /// replayable via the history fetch after a reconnect.
    pub async fn relay_message(&self, message: ChatMessage) -> Result<(), RepoError> {
        self.chat_log.append_message(&message).await?;
        let sessions = self.sessions.lock().await;
        if let Some((_, peer)) = resolve_peer(&sessions, message.ride_id, message.sender_id) {
            let _ = peer.tx.send(HubEvent::NewMessage { message });
        } else {
            debug!("message stored, peer offline: ride={}", message.ride_id);
        }
        Ok(())
    }

    /// Transient typing indicator. A `true` arms an auto-clear that fires a
    /// synthetic `false` after [`TYPING_CLEAR_SECONDS`] unless a follow-up
    /// typing frame lands first.
    pub async fn relay_typing(self: &Arc<Self>, ride_id: Uuid, sender_id: Uuid, is_typing: bool) {
        let armed_gen = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(&ride_id) else {
                return;
            };
            let Some(sender_role) = session.role_of(sender_id) else {
                return;
            };
            let Some(peer) = session.slot_mut(sender_role.opposite()).as_mut() else {
                return;
            };
            let _ = peer.tx.send(HubEvent::Typing { sender_id, is_typing });
            peer.typing_gen = peer.typing_gen.wrapping_add(1);
            is_typing.then_some((peer.user_id, peer.typing_gen))
        };

        if let Some((peer_user, gen)) = armed_gen {
            let hub = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(TYPING_CLEAR_SECONDS)).await;
                let sessions = hub.sessions.lock().await;
                let Some(session) = sessions.get(&ride_id) else {
                    return;
                };
                let peer = match (session.driver.as_ref(), session.passenger.as_ref()) {
                    (Some(s), _) if s.user_id == peer_user => s,
                    (_, Some(s)) if s.user_id == peer_user => s,
                    _ => return,
                };
                if peer.typing_gen == gen {
                    let _ = peer.tx.send(HubEvent::Typing {
                        sender_id,
                        is_typing: false,
                    });
                }
            });
        }
    }
}

fn resolve_peer<'a>(
    sessions: &'a HashMap<Uuid, Session>,
    ride_id: Uuid,
    sender_id: Uuid,
) -> Option<(Role, &'a Slot)> {
    let session = sessions.get(&ride_id)?;
    let sender_role = session.role_of(sender_id)?;
    let peer_role = sender_role.opposite();
    session.slot(peer_role).as_ref().map(|slot| (peer_role, slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    #[derive(Default)]
    struct MemChatLog {
        messages: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl ChatRepository for MemChatLog {
        async fn append_message(&self, message: &ChatMessage) -> Result<(), RepoError> {
            self.messages.lock().await.push(message.clone());
            Ok(())
        }

        async fn ride_history(&self, ride_id: Uuid) -> Result<Vec<ChatMessage>, RepoError> {
            Ok(self
                .messages
                .lock()
                .await
                .iter()
                .filter(|m| m.ride_id == ride_id)
                .cloned()
                .collect())
        }
    }

    fn location(ride_id: Uuid, user_id: Uuid, role: Role) -> LiveLocation {
        LiveLocation {
            user_id,
            ride_id,
            role,
            lat: 18.52,
            lng: 73.85,
            heading: Some(90.0),
            sent_at: Utc::now(),
        }
    }

    fn message(ride_id: Uuid, sender_id: Uuid, text: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            ride_id,
            sender_id,
            sender_name: "Asha".into(),
            text: text.into(),
            sent_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn location_without_peer_is_dropped_not_replayed() {
        let log = Arc::new(MemChatLog::default());
        let hub = CoordinationHub::new(log);
        let ride = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let (_, mut driver_rx) = hub.join(ride, driver, Role::Driver).await;
        hub.relay_location(location(ride, driver, Role::Driver)).await;

        // Passenger joins after the sample was sent; nothing is queued.
        let (_, mut passenger_rx) = hub.join(ride, passenger, Role::Passenger).await;
        assert!(matches!(
            driver_rx.try_recv(),
            Ok(HubEvent::PeerJoined { .. })
        ));
        assert!(passenger_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn paired_parties_relay_bidirectionally() {
        let hub = CoordinationHub::new(Arc::new(MemChatLog::default()));
        let ride = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let (_, mut driver_rx) = hub.join(ride, driver, Role::Driver).await;
        let (_, mut passenger_rx) = hub.join(ride, passenger, Role::Passenger).await;
        assert_eq!(hub.session_state(ride).await, SessionState::Paired);

        hub.relay_location(location(ride, driver, Role::Driver)).await;
        hub.relay_location(location(ride, passenger, Role::Passenger)).await;

        // Skip the driver's peer-joined frame first.
        assert!(matches!(
            driver_rx.try_recv(),
            Ok(HubEvent::PeerJoined { .. })
        ));
        assert!(matches!(
            driver_rx.try_recv(),
            Ok(HubEvent::LocationUpdate { .. })
        ));
        assert!(matches!(
            passenger_rx.try_recv(),
            Ok(HubEvent::LocationUpdate { .. })
        ));
    }

    #[tokio::test]
    async fn chat_is_durable_even_when_peer_is_offline() {
        let log = Arc::new(MemChatLog::default());
        let hub = CoordinationHub::new(Arc::clone(&log) as Arc<dyn ChatRepository>);
        let ride = Uuid::new_v4();
        let driver = Uuid::new_v4();

        let (_, _driver_rx) = hub.join(ride, driver, Role::Driver).await;
        hub.relay_message(message(ride, driver, "leaving in 5"))
            .await
            .unwrap();

        let history = log.ride_history(ride).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "leaving in 5");
    }

    #[tokio::test]
    async fn rejoin_replaces_stale_registration() {
        let hub = CoordinationHub::new(Arc::new(MemChatLog::default()));
        let ride = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let (_, mut stale_rx) = hub.join(ride, driver, Role::Driver).await;
        let (_, mut fresh_rx) = hub.join(ride, driver, Role::Driver).await;
        let (_, _passenger_rx) = hub.join(ride, passenger, Role::Passenger).await;

        hub.relay_location(location(ride, passenger, Role::Passenger)).await;
        assert!(matches!(
            fresh_rx.try_recv(),
            Ok(HubEvent::LocationUpdate { .. })
        ));
        assert!(matches!(
            stale_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn leave_notifies_the_remaining_party() {
        let hub = CoordinationHub::new(Arc::new(MemChatLog::default()));
        let ride = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let (driver_token, _driver_rx) = hub.join(ride, driver, Role::Driver).await;
        let (passenger_token, mut passenger_rx) = hub.join(ride, passenger, Role::Passenger).await;
        hub.leave(ride, driver_token).await;

        assert!(matches!(
            passenger_rx.try_recv(),
            Ok(HubEvent::PeerLeft { user_id, role: Role::Driver }) if user_id == driver
        ));
        assert_eq!(hub.session_state(ride).await, SessionState::WaitingForPeer);

        hub.leave(ride, passenger_token).await;
        assert_eq!(hub.session_state(ride).await, SessionState::Idle);
    }

    #[tokio::test]
    async fn stale_leave_after_rejoin_keeps_fresh_slot() {
        let hub = CoordinationHub::new(Arc::new(MemChatLog::default()));
        let ride = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let (stale_token, _stale_rx) = hub.join(ride, driver, Role::Driver).await;
        let (_, mut fresh_rx) = hub.join(ride, driver, Role::Driver).await;
        let (_, mut passenger_rx) = hub.join(ride, passenger, Role::Passenger).await;

        // The stale connection's teardown races in after the re-join
        // already took the slot.
        hub.leave(ride, stale_token).await;

        assert_eq!(hub.session_state(ride).await, SessionState::Paired);
        assert!(passenger_rx.try_recv().is_err());

        hub.relay_location(location(ride, passenger, Role::Passenger)).await;
        assert!(matches!(
            fresh_rx.try_recv(),
            Ok(HubEvent::PeerJoined { .. })
        ));
        assert!(matches!(
            fresh_rx.try_recv(),
            Ok(HubEvent::LocationUpdate { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn typing_auto_clears_after_timeout() {
        let hub = CoordinationHub::new(Arc::new(MemChatLog::default()));
        let ride = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let (_, _driver_rx) = hub.join(ride, driver, Role::Driver).await;
        let (_, mut passenger_rx) = hub.join(ride, passenger, Role::Passenger).await;

        hub.relay_typing(ride, driver, true).await;
        assert!(matches!(
            passenger_rx.try_recv(),
            Ok(HubEvent::Typing { is_typing: true, .. })
        ));

        tokio::time::sleep(Duration::from_secs(TYPING_CLEAR_SECONDS + 1)).await;
        assert!(matches!(
            passenger_rx.recv().await,
            Some(HubEvent::Typing { is_typing: false, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_stop_typing_disarms_the_auto_clear() {
        let hub = CoordinationHub::new(Arc::new(MemChatLog::default()));
        let ride = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let (_, _driver_rx) = hub.join(ride, driver, Role::Driver).await;
        let (_, mut passenger_rx) = hub.join(ride, passenger, Role::Passenger).await;

        hub.relay_typing(ride, driver, true).await;
        hub.relay_typing(ride, driver, false).await;
        assert!(matches!(
            passenger_rx.try_recv(),
            Ok(HubEvent::Typing { is_typing: true, .. })
        ));
        assert!(matches!(
            passenger_rx.try_recv(),
            Ok(HubEvent::Typing { is_typing: false, .. })
        ));

        tokio::time::sleep(Duration::from_secs(TYPING_CLEAR_SECONDS + 1)).await;
        // No synthetic third frame arrives.
        assert!(passenger_rx.try_recv().is_err());
    }
}
