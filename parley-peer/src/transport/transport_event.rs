use parley_core::{Candidate, Description, ParticipantId, RemoteTrack};
use std::fmt;
use tokio::sync::mpsc;

/// Identifies one incarnation of a peer session. A new session for the same
/// remote participant gets a new epoch, so events from a closed session can be
/// told apart from events for its replacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub remote_id: ParticipantId,
    pub epoch: u64,
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.remote_id, self.epoch)
    }
}

/// Events the transport side feeds back into the coordinator loop.
#[derive(Debug)]
pub enum TransportEvent {
    /// The local description was created and applied.
    LocalDescriptionApplied(SessionKey, Description),

    /// The remote description was applied.
    RemoteDescriptionApplied(SessionKey),

    /// A transport operation was rejected; the session must close.
    OperationFailed(SessionKey, String),

    /// A local network-path candidate was discovered and should be trickled.
    CandidateDiscovered(SessionKey, Candidate),

    /// Media from the remote participant arrived.
    RemoteTrackReceived(SessionKey, RemoteTrack),
}

impl TransportEvent {
    pub fn key(&self) -> &SessionKey {
        match self {
            TransportEvent::LocalDescriptionApplied(key, _)
            | TransportEvent::RemoteDescriptionApplied(key)
            | TransportEvent::OperationFailed(key, _)
            | TransportEvent::CandidateDiscovered(key, _)
            | TransportEvent::RemoteTrackReceived(key, _) => key,
        }
    }
}

/// Handle a media transport uses to report asynchronous discoveries.
#[derive(Clone)]
pub struct TransportEventSink {
    key: SessionKey,
    tx: mpsc::Sender<TransportEvent>,
}

impl TransportEventSink {
    pub(crate) fn new(key: SessionKey, tx: mpsc::Sender<TransportEvent>) -> Self {
        Self { key, tx }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn remote_id(&self) -> &ParticipantId {
        &self.key.remote_id
    }

    pub async fn candidate_discovered(&self, candidate: Candidate) {
        let _ = self
            .tx
            .send(TransportEvent::CandidateDiscovered(self.key.clone(), candidate))
            .await;
    }

    pub async fn remote_track_received(&self, track: RemoteTrack) {
        let _ = self
            .tx
            .send(TransportEvent::RemoteTrackReceived(self.key.clone(), track))
            .await;
    }
}
