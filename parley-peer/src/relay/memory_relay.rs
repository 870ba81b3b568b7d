use crate::error::RelayError;
use crate::relay::{RelayClient, RelayEvent};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parley_core::{ParticipantId, RoomId};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

struct RelayInner {
    logged_in: DashSet<ParticipantId>,
    inboxes: DashMap<ParticipantId, mpsc::UnboundedSender<RelayEvent>>,
    rooms: DashMap<RoomId, Vec<ParticipantId>>,
    token: Option<String>,
}

/// In-process relay hub. Every participant gets its own [`MemoryRelayClient`].
///
/// Delivery is immediate and in order per sender/recipient pair, which is more
/// than the coordinator relies on.
#[derive(Clone)]
pub struct MemoryRelay {
    inner: Arc<RelayInner>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A relay that only accepts logins presenting `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::build(Some(token.into()))
    }

    fn build(token: Option<String>) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                logged_in: DashSet::new(),
                inboxes: DashMap::new(),
                rooms: DashMap::new(),
                token,
            }),
        }
    }

    pub fn client(&self) -> MemoryRelayClient {
        MemoryRelayClient {
            relay: self.clone(),
            session: Mutex::new(ClientSession::default()),
        }
    }

    pub fn members(&self, room: &RoomId) -> Vec<ParticipantId> {
        self.inner
            .rooms
            .get(room)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    pub fn is_logged_in(&self, participant_id: &ParticipantId) -> bool {
        self.inner.logged_in.contains(participant_id)
    }

    fn deliver(&self, to: &ParticipantId, event: RelayEvent) -> bool {
        match self.inner.inboxes.get(to) {
            Some(inbox) => inbox.send(event).is_ok(),
            None => false,
        }
    }

    fn remove_member(&self, room: &RoomId, participant_id: &ParticipantId) {
        let remaining = {
            let Some(mut members) = self.inner.rooms.get_mut(room) else {
                return;
            };
            members.retain(|m| m != participant_id);
            members.clone()
        };
        self.inner
            .rooms
            .remove_if(room, |_, members| members.is_empty());

        for member in &remaining {
            self.deliver(member, RelayEvent::MemberLeft(participant_id.clone()));
        }
        info!("{} left room '{}'", participant_id, room);
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct ClientSession {
    participant_id: Option<ParticipantId>,
    room: Option<RoomId>,
}

/// One participant's connection to a [`MemoryRelay`].
pub struct MemoryRelayClient {
    relay: MemoryRelay,
    session: Mutex<ClientSession>,
}

impl MemoryRelayClient {
    pub async fn participant_id(&self) -> Option<ParticipantId> {
        self.session.lock().await.participant_id.clone()
    }
}

#[async_trait]
impl RelayClient for MemoryRelayClient {
    async fn login(
        &self,
        participant_id: &ParticipantId,
        credentials: Option<&str>,
    ) -> Result<(), RelayError> {
        let inner = &self.relay.inner;
        if let Some(token) = &inner.token {
            if credentials != Some(token.as_str()) {
                return Err(RelayError::Auth(
                    participant_id.clone(),
                    "invalid credentials".into(),
                ));
            }
        }

        let mut session = self.session.lock().await;
        if session.participant_id.is_some() {
            return Err(RelayError::Relay("client is already logged in".into()));
        }
        if !inner.logged_in.insert(participant_id.clone()) {
            return Err(RelayError::Auth(
                participant_id.clone(),
                "participant id already in use".into(),
            ));
        }

        session.participant_id = Some(participant_id.clone());
        debug!("{} logged in to the relay", participant_id);
        Ok(())
    }

    async fn join_room(
        &self,
        room: &RoomId,
    ) -> Result<mpsc::UnboundedReceiver<RelayEvent>, RelayError> {
        let mut session = self.session.lock().await;
        let participant_id = session
            .participant_id
            .clone()
            .ok_or(RelayError::NotLoggedIn)?;
        if let Some(joined) = &session.room {
            return Err(RelayError::Relay(format!("already joined room '{}'", joined)));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.relay.inner.inboxes.insert(participant_id.clone(), tx);

        let existing = {
            let mut members = self.relay.inner.rooms.entry(room.clone()).or_default();
            let existing = members.clone();
            members.push(participant_id.clone());
            existing
        };
        for member in &existing {
            self.relay
                .deliver(member, RelayEvent::MemberJoined(participant_id.clone()));
        }

        session.room = Some(room.clone());
        info!(
            "{} joined room '{}' ({} already present)",
            participant_id,
            room,
            existing.len()
        );
        Ok(rx)
    }

    async fn send_to_peer(&self, participant_id: &ParticipantId, payload: String) {
        let Some(sender) = self.session.lock().await.participant_id.clone() else {
            warn!("Dropping message to {}: not logged in", participant_id);
            return;
        };

        let delivered = self.relay.deliver(
            participant_id,
            RelayEvent::MessageFromPeer {
                sender: sender.clone(),
                payload,
            },
        );
        if !delivered {
            warn!(
                "Attempted to send message from {} to unreachable participant {}",
                sender, participant_id
            );
        }
    }

    async fn leave(&self) {
        let mut session = self.session.lock().await;
        let (Some(participant_id), Some(room)) =
            (session.participant_id.clone(), session.room.take())
        else {
            return;
        };
        self.relay.remove_member(&room, &participant_id);
    }

    async fn logout(&self) {
        let mut session = self.session.lock().await;
        let Some(participant_id) = session.participant_id.take() else {
            return;
        };
        if let Some(room) = session.room.take() {
            self.relay.remove_member(&room, &participant_id);
        }
        self.relay.inner.inboxes.remove(&participant_id);
        self.relay.inner.logged_in.remove(&participant_id);
        debug!("{} logged out of the relay", participant_id);
    }
}
