use crate::error::RelayError;
use async_trait::async_trait;
use parley_core::{ParticipantId, RoomId};
use tokio::sync::mpsc;

use super::RelayEvent;

/// The relay a participant talks through. Implemented by the surrounding
/// application (or [`super::MemoryRelay`] in-process).
///
/// Delivery is best effort: no ordering or success guarantee is assumed.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn login(
        &self,
        participant_id: &ParticipantId,
        credentials: Option<&str>,
    ) -> Result<(), RelayError>;

    /// Join a room. Membership changes and direct messages arrive on the
    /// returned channel.
    async fn join_room(
        &self,
        room: &RoomId,
    ) -> Result<mpsc::UnboundedReceiver<RelayEvent>, RelayError>;

    async fn send_to_peer(&self, participant_id: &ParticipantId, payload: String);

    /// Leave the joined room. Idempotent.
    async fn leave(&self);

    /// Idempotent.
    async fn logout(&self);
}
