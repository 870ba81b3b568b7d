use crate::error::NegotiationError;
use crate::session::{NegotiationState, Role};
use async_trait::async_trait;
use parley_core::{ParticipantId, RemoteTrack};

/// Hooks through which the surrounding application follows its sessions.
/// All methods default to doing nothing.
#[async_trait]
pub trait SessionObserver: Send + Sync + 'static {
    async fn on_role_assigned(&self, _peer_id: ParticipantId, _role: Role) {}

    async fn on_state_changed(&self, _peer_id: ParticipantId, _state: NegotiationState) {}

    /// Start rendering this track.
    async fn on_remote_track(&self, _peer_id: ParticipantId, _track: RemoteTrack) {}

    async fn on_negotiation_failed(&self, _peer_id: ParticipantId, _error: &NegotiationError) {}

    /// Stop rendering everything received from this participant.
    async fn on_session_closed(&self, _peer_id: ParticipantId) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
