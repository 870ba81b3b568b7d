use crate::coordinator::CoordinatorCommand;
use crate::error::CoordinatorError;
use crate::media::LocalMedia;
use crate::session::SessionSnapshot;
use parley_core::ParticipantId;
use tokio::sync::{mpsc, oneshot};

/// Cloneable access to a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    local_id: ParticipantId,
    local_media: LocalMedia,
    command_tx: mpsc::Sender<CoordinatorCommand>,
}

impl CoordinatorHandle {
    pub(crate) fn new(
        local_id: ParticipantId,
        local_media: LocalMedia,
        command_tx: mpsc::Sender<CoordinatorCommand>,
    ) -> Self {
        Self {
            local_id,
            local_media,
            command_tx,
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn local_media(&self) -> &LocalMedia {
        &self.local_media
    }

    pub async fn snapshot(&self) -> Result<Vec<SessionSnapshot>, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(CoordinatorCommand::Snapshot { reply })
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    pub async fn session(
        &self,
        peer_id: &ParticipantId,
    ) -> Result<Option<SessionSnapshot>, CoordinatorError> {
        Ok(self
            .snapshot()
            .await?
            .into_iter()
            .find(|s| &s.remote_id == peer_id))
    }

    /// Leave the room and wait until every session is torn down.
    pub async fn leave(&self) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(CoordinatorCommand::Leave { reply })
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}
