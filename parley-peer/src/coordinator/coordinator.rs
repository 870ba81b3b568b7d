use crate::coordinator::{CoordinatorCommand, CoordinatorHandle, SessionObserver};
use crate::error::NegotiationError;
use crate::media::LocalMedia;
use crate::relay::{RelayClient, RelayEvent};
use crate::session::{
    CandidateDisposition, NegotiationState, PeerSession, Role, SessionSnapshot, SessionWorker,
};
use crate::transport::{SessionKey, TransportConfig, TransportEvent, TransportFactory};
use parley_core::{
    Candidate, Description, DescriptionKind, NegotiationMessage, ParticipantId, decode, encode,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns every [`PeerSession`] of one local participant.
///
/// Membership events, inbound messages and transport completions all funnel
/// into [`Coordinator::run`], which handles them one at a time. Transport
/// calls are handed to per-session workers and never awaited here, so a slow
/// description application for one peer does not hold up another.
pub struct Coordinator {
    local_id: ParticipantId,

    /// At most one session per remote participant.
    sessions: HashMap<ParticipantId, PeerSession>,

    /// Epoch handed to the next session, so late transport events of a
    /// replaced session can be told apart.
    next_epoch: u64,

    relay: Arc<dyn RelayClient>,

    /// Membership changes and inbound messages from the relay.
    relay_rx: mpsc::UnboundedReceiver<RelayEvent>,

    /// Requests from [`CoordinatorHandle`]s.
    command_rx: mpsc::Receiver<CoordinatorCommand>,

    /// Completions reported by session workers.
    transport_rx: mpsc::Receiver<TransportEvent>,

    /// Cloned into every session worker.
    transport_tx: mpsc::Sender<TransportEvent>,

    transports: Arc<dyn TransportFactory>,
    transport_config: TransportConfig,

    /// Capture shared by all sessions; released on leave.
    local_media: LocalMedia,

    observer: Arc<dyn SessionObserver>,
}

impl Coordinator {
    pub fn new(
        local_id: ParticipantId,
        relay: Arc<dyn RelayClient>,
        relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
        transports: Arc<dyn TransportFactory>,
        transport_config: TransportConfig,
        local_media: LocalMedia,
        observer: Arc<dyn SessionObserver>,
    ) -> (Self, CoordinatorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (transport_tx, transport_rx) = mpsc::channel(256);

        let handle = CoordinatorHandle::new(local_id.clone(), local_media.clone(), command_tx);
        let coordinator = Self {
            local_id,
            sessions: HashMap::new(),
            next_epoch: 0,
            relay,
            relay_rx,
            command_rx,
            transport_rx,
            transport_tx,
            transports,
            transport_config,
            local_media,
            observer,
        };
        (coordinator, handle)
    }

    pub async fn run(mut self) {
        info!("Coordinator for {} started", self.local_id);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(CoordinatorCommand::Snapshot { reply }) => {
                            let _ = reply.send(self.snapshot());
                        }
                        Some(CoordinatorCommand::Leave { reply }) => {
                            self.shutdown().await;
                            let _ = reply.send(());
                            break;
                        }
                        None => {
                            info!("All coordinator handles dropped. Leaving.");
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                evt = self.relay_rx.recv() => {
                    match evt {
                        Some(e) => self.handle_relay_event(e).await,
                        None => {
                            warn!("Relay channel closed unexpectedly");
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt).await;
                }
            }
        }

        info!("Coordinator for {} finished", self.local_id);
    }

    fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<_> = self.sessions.values().map(PeerSession::snapshot).collect();
        sessions.sort_by(|a, b| a.remote_id.cmp(&b.remote_id));
        sessions
    }

    async fn handle_relay_event(&mut self, event: RelayEvent) {
        let result = match event {
            RelayEvent::MemberJoined(peer_id) => self.on_member_joined(peer_id).await,
            RelayEvent::MemberLeft(peer_id) => {
                self.on_member_left(peer_id).await;
                Ok(())
            }
            RelayEvent::MessageFromPeer { sender, payload } => {
                self.on_message(sender, &payload).await
            }
        };

        if let Err(e) = result {
            self.report(e);
        }
    }

    fn report(&self, err: NegotiationError) {
        match err {
            NegotiationError::Decode { .. } => warn!("Dropping message: {}", err),
            NegotiationError::DuplicateDescription { .. } => info!("Discarding {}", err),
            NegotiationError::StaleMessage { .. } | NegotiationError::OutOfOrder { .. } => {
                debug!("Discarding {}", err)
            }
            NegotiationError::NegotiationFailed { .. } => error!("{}", err),
        }
    }

    async fn on_member_joined(&mut self, peer_id: ParticipantId) -> Result<(), NegotiationError> {
        if peer_id == self.local_id {
            return Ok(());
        }
        info!("{} joined the room; offering", peer_id);

        if self.sessions.contains_key(&peer_id) {
            info!("{} re-joined; replacing its session", peer_id);
            self.close_session(&peer_id, None).await;
        }
        if !self.sessions.is_empty() {
            warn!(
                "{} joined while {} session(s) are active; negotiating it separately",
                peer_id,
                self.sessions.len()
            );
        }

        self.open_session(&peer_id, Role::Offerer).await;
        self.session_mut(&peer_id, "join")?
            .begin_local_description()?;
        self.observer
            .on_state_changed(peer_id, NegotiationState::LocalDescriptionPending)
            .await;
        Ok(())
    }

    async fn on_member_left(&mut self, peer_id: ParticipantId) {
        if self.close_session(&peer_id, None).await.is_none() {
            debug!("{} left without an active session", peer_id);
        }
    }

    async fn on_message(
        &mut self,
        sender: ParticipantId,
        payload: &str,
    ) -> Result<(), NegotiationError> {
        let message = decode(payload).map_err(|source| NegotiationError::Decode {
            peer: sender.clone(),
            source,
        })?;
        debug!("Received {} from {}", message.kind(), sender);

        match message {
            NegotiationMessage::Offer { offer } => self.on_offer(sender, offer).await,
            NegotiationMessage::Answer { answer } => self.on_answer(sender, answer),
            NegotiationMessage::Candidate { candidate } => {
                self.on_remote_candidate(sender, candidate)
            }
        }
    }

    async fn on_offer(
        &mut self,
        sender: ParticipantId,
        offer: Description,
    ) -> Result<(), NegotiationError> {
        if let Some(existing) = self.sessions.get(&sender) {
            if existing.is_same_offer(&offer) {
                return Err(NegotiationError::DuplicateDescription {
                    peer: sender,
                    kind: DescriptionKind::Offer,
                });
            }
            info!(
                "New offer from {} supersedes session {}",
                sender,
                existing.key()
            );
            self.close_session(&sender, None).await;
        }

        self.open_session(&sender, Role::Answerer).await;
        let session = self.session_mut(&sender, "offer")?;
        session.accept_remote_description(offer)?;
        session.begin_local_description()?;
        self.observer
            .on_state_changed(sender, NegotiationState::LocalDescriptionPending)
            .await;
        Ok(())
    }

    fn on_answer(
        &mut self,
        sender: ParticipantId,
        answer: Description,
    ) -> Result<(), NegotiationError> {
        let session = self.session_mut(&sender, "answer")?;
        if session.role() != Role::Offerer {
            return Err(NegotiationError::OutOfOrder {
                peer: sender,
                kind: "answer",
                state: session.state(),
            });
        }
        session.accept_remote_description(answer)?;
        debug!("Applying answer from {}", sender);
        Ok(())
    }

    fn on_remote_candidate(
        &mut self,
        sender: ParticipantId,
        candidate: Candidate,
    ) -> Result<(), NegotiationError> {
        let session = self.session_mut(&sender, "candidate")?;
        match session.accept_candidate(candidate) {
            CandidateDisposition::Applied => debug!("Applying candidate from {}", sender),
            CandidateDisposition::Buffered => debug!(
                "Buffering candidate from {} ({} pending)",
                sender,
                session.pending_candidates().len()
            ),
            // The session already warned.
            CandidateDisposition::Dropped => {}
        }
        Ok(())
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        let key = event.key().clone();
        if self.live_session(&key).is_none() {
            debug!("Ignoring transport event for closed session {}", key);
            return;
        }

        match event {
            TransportEvent::LocalDescriptionApplied(_, description) => {
                let kind = description.kind;
                let Some(session) = self.live_session(&key) else {
                    return;
                };
                let outgoing = session.on_local_description_applied(description);
                let state = session.state();

                info!("Local {} applied for {}; sending", kind, key);
                for message in &outgoing {
                    self.send(&key.remote_id, message).await;
                }
                self.observer.on_state_changed(key.remote_id, state).await;
            }

            TransportEvent::RemoteDescriptionApplied(_) => {
                let Some(session) = self.live_session(&key) else {
                    return;
                };
                let before = session.state();
                let flushed = session.on_remote_description_applied();
                let after = session.state();

                info!(
                    "Remote description applied for {}; flushed {} buffered candidate(s)",
                    key, flushed
                );
                if before != after {
                    self.observer.on_state_changed(key.remote_id, after).await;
                }
            }

            TransportEvent::CandidateDiscovered(_, candidate) => {
                let Some(session) = self.live_session(&key) else {
                    return;
                };
                match session.on_local_candidate(candidate) {
                    Some(message) => self.send(&key.remote_id, &message).await,
                    None => debug!("Holding local candidate for {} until description is out", key),
                }
            }

            TransportEvent::RemoteTrackReceived(_, track) => {
                info!("Received remote {} track from {}", track.kind, key);
                self.observer.on_remote_track(key.remote_id, track).await;
            }

            TransportEvent::OperationFailed(_, reason) => {
                let err = NegotiationError::NegotiationFailed {
                    peer: key.remote_id.clone(),
                    reason,
                };
                error!("{}", err);
                self.close_session(&key.remote_id, Some(&err)).await;
            }
        }
    }

    async fn open_session(&mut self, peer_id: &ParticipantId, role: Role) {
        self.next_epoch += 1;
        let key = SessionKey {
            remote_id: peer_id.clone(),
            epoch: self.next_epoch,
        };

        let worker = SessionWorker::spawn(
            key.clone(),
            self.transports.clone(),
            self.transport_config.clone(),
            self.local_media.clone(),
            self.transport_tx.clone(),
        );

        info!("Opened session {} as {}", key, role);
        self.sessions
            .insert(peer_id.clone(), PeerSession::new(key, role, worker));
        self.observer.on_role_assigned(peer_id.clone(), role).await;
    }

    /// Removes and closes the session for `peer_id`, telling the application
    /// to stop rendering it.
    async fn close_session(
        &mut self,
        peer_id: &ParticipantId,
        failure: Option<&NegotiationError>,
    ) -> Option<JoinHandle<()>> {
        let mut session = self.sessions.remove(peer_id)?;
        let worker = session.close();
        info!("Closed session {}", session.key());

        self.observer
            .on_state_changed(peer_id.clone(), NegotiationState::Closed)
            .await;
        if let Some(err) = failure {
            self.observer
                .on_negotiation_failed(peer_id.clone(), err)
                .await;
        }
        self.observer.on_session_closed(peer_id.clone()).await;
        worker
    }

    fn session_mut(
        &mut self,
        peer_id: &ParticipantId,
        kind: &'static str,
    ) -> Result<&mut PeerSession, NegotiationError> {
        self.sessions
            .get_mut(peer_id)
            .ok_or_else(|| NegotiationError::StaleMessage {
                peer: peer_id.clone(),
                kind,
            })
    }

    fn live_session(&mut self, key: &SessionKey) -> Option<&mut PeerSession> {
        self.sessions
            .get_mut(&key.remote_id)
            .filter(|s| s.epoch() == key.epoch && !s.state().is_closed())
    }

    async fn send(&self, peer_id: &ParticipantId, message: &NegotiationMessage) {
        match encode(message) {
            Ok(payload) => {
                debug!("Sending {} to {}", message.kind(), peer_id);
                self.relay.send_to_peer(peer_id, payload).await;
            }
            Err(e) => error!("Failed to encode {} for {}: {}", message.kind(), peer_id, e),
        }
    }

    async fn shutdown(&mut self) {
        info!(
            "{} leaving; closing {} session(s)",
            self.local_id,
            self.sessions.len()
        );

        // Workers must not block on a queue nobody drains any more.
        self.transport_rx.close();

        let peers: Vec<_> = self.sessions.keys().cloned().collect();
        let mut workers = Vec::with_capacity(peers.len());
        for peer_id in peers {
            if let Some(worker) = self.close_session(&peer_id, None).await {
                workers.push(worker);
            }
        }
        // One deadline for all of them, not one each.
        let deadline = Instant::now() + WORKER_SHUTDOWN_TIMEOUT;
        for mut worker in workers {
            if tokio::time::timeout_at(deadline, &mut worker).await.is_err() {
                warn!("Session worker did not stop in time; aborting it");
                worker.abort();
            }
        }

        self.relay.leave().await;
        self.relay.logout().await;
        self.local_media.release().await;
        info!("{} left", self.local_id);
    }
}
