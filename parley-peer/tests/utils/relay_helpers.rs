use anyhow::{Context, Result, bail};
use parley_core::{NegotiationMessage, ParticipantId, RoomId, decode, encode};
use parley_peer::coordinator::{CoordinatorHandle, SessionObserver};
use parley_peer::media::{MediaSource, SyntheticMediaSource};
use parley_peer::relay::{MemoryRelay, MemoryRelayClient, RelayClient, RelayEvent};
use parley_peer::session::{NegotiationState, SessionSnapshot};
use parley_peer::transport::{TransportConfig, TransportFactory};
use parley_peer::{Participant, ParticipantConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout for a single relay message (ms).
pub const MESSAGE_TIMEOUT_MS: u64 = 2000;

/// Timeout for a negotiation to settle (ms).
pub const NEGOTIATION_TIMEOUT_MS: u64 = 5000;

/// Log in and join `room` as a coordinated participant.
pub async fn start_participant(
    relay: &MemoryRelay,
    room: &str,
    participant_id: &str,
    transports: Arc<dyn TransportFactory>,
    observer: Arc<dyn SessionObserver>,
) -> Result<CoordinatorHandle> {
    let media = Arc::new(SyntheticMediaSource::new(participant_id));
    start_participant_with_media(relay, room, participant_id, media, transports, observer).await
}

/// Like [`start_participant`], capturing from `media`.
pub async fn start_participant_with_media(
    relay: &MemoryRelay,
    room: &str,
    participant_id: &str,
    media: Arc<dyn MediaSource>,
    transports: Arc<dyn TransportFactory>,
    observer: Arc<dyn SessionObserver>,
) -> Result<CoordinatorHandle> {
    let config = ParticipantConfig::new(room)
        .with_participant_id(participant_id)
        .with_transport(TransportConfig::local_only());

    Participant::connect(
        config,
        Arc::new(relay.client()),
        media,
        transports,
        observer,
    )
    .await
    .context("Failed to connect participant")
}

/// A relay member driven by hand, speaking the wire format directly.
pub struct ScriptedPeer {
    pub id: ParticipantId,
    client: MemoryRelayClient,
    rx: mpsc::UnboundedReceiver<RelayEvent>,
}

impl ScriptedPeer {
    pub async fn join(relay: &MemoryRelay, room: &str, participant_id: &str) -> Result<Self> {
        let id = ParticipantId::from(participant_id);
        let client = relay.client();
        client.login(&id, None).await?;
        let rx = client.join_room(&RoomId::from(room)).await?;
        Ok(Self { id, client, rx })
    }

    pub async fn send(&self, to: &ParticipantId, message: &NegotiationMessage) -> Result<()> {
        let payload = encode(message)?;
        self.client.send_to_peer(to, payload).await;
        Ok(())
    }

    pub async fn send_raw(&self, to: &ParticipantId, payload: &str) {
        self.client.send_to_peer(to, payload.to_owned()).await;
    }

    pub async fn leave(&self) {
        self.client.leave().await;
    }

    /// Next relay event of any kind.
    pub async fn next_event(&mut self, timeout_ms: u64) -> Result<RelayEvent> {
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.rx.recv())
            .await
            .context("Timed out waiting for relay event")?
            .context("Relay channel closed")
    }

    /// Next negotiation message, skipping membership events.
    pub async fn next_message(&mut self, timeout_ms: u64) -> Result<(ParticipantId, NegotiationMessage)> {
        loop {
            match self.next_event(timeout_ms).await? {
                RelayEvent::MessageFromPeer { sender, payload } => {
                    return Ok((sender, decode(&payload)?));
                }
                other => tracing::debug!("[ScriptedPeer] skipping {:?}", other),
            }
        }
    }

    /// Wait for an offer and return it.
    pub async fn expect_offer(&mut self) -> Result<(ParticipantId, NegotiationMessage)> {
        let (sender, message) = self.next_message(MESSAGE_TIMEOUT_MS).await?;
        if !matches!(message, NegotiationMessage::Offer { .. }) {
            bail!("expected an offer from {}, got {}", sender, message.kind());
        }
        Ok((sender, message))
    }

    /// Collect `count` negotiation messages.
    pub async fn collect_messages(&mut self, count: usize) -> Result<Vec<NegotiationMessage>> {
        let mut messages = Vec::with_capacity(count);
        while messages.len() < count {
            let (_, message) = self.next_message(MESSAGE_TIMEOUT_MS).await?;
            messages.push(message);
        }
        Ok(messages)
    }

    /// Whether no further message shows up within `timeout_ms`.
    pub async fn is_quiet(&mut self, timeout_ms: u64) -> bool {
        self.next_message(timeout_ms).await.is_err()
    }
}

/// Poll the coordinator until the session for `peer_id` matches `predicate`.
pub async fn wait_for_session<F>(
    handle: &CoordinatorHandle,
    peer_id: &ParticipantId,
    predicate: F,
    timeout_ms: u64,
) -> Option<SessionSnapshot>
where
    F: Fn(&SessionSnapshot) -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        if let Ok(Some(session)) = handle.session(peer_id).await {
            if predicate(&session) {
                return Some(session);
            }
        }
        if start.elapsed() > timeout {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_state(
    handle: &CoordinatorHandle,
    peer_id: &ParticipantId,
    state: NegotiationState,
    timeout_ms: u64,
) -> Option<SessionSnapshot> {
    wait_for_session(handle, peer_id, |s| s.state == state, timeout_ms).await
}

/// Poll until the coordinator no longer has a session for `peer_id`.
pub async fn wait_for_no_session(
    handle: &CoordinatorHandle,
    peer_id: &ParticipantId,
    timeout_ms: u64,
) -> bool {
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        if let Ok(None) = handle.session(peer_id).await {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
