use crate::coordinator::{Coordinator, CoordinatorHandle, SessionObserver};
use crate::error::ConnectError;
use crate::media::{LocalMedia, MediaSource};
use crate::relay::RelayClient;
use crate::transport::{TransportConfig, TransportFactory};
use parley_core::{ParticipantId, RoomId};
use std::sync::Arc;
use tracing::{error, info};

/// Everything a participant needs to enter a room.
#[derive(Debug, Clone)]
pub struct ParticipantConfig {
    pub participant_id: ParticipantId,
    pub room: RoomId,
    pub credentials: Option<String>,
    pub transport: TransportConfig,
}

impl ParticipantConfig {
    /// A random participant id, no credentials and the default STUN servers.
    pub fn new(room: impl Into<RoomId>) -> Self {
        Self {
            participant_id: ParticipantId::random(),
            room: room.into(),
            credentials: None,
            transport: TransportConfig::default(),
        }
    }

    pub fn with_participant_id(mut self, participant_id: impl Into<ParticipantId>) -> Self {
        self.participant_id = participant_id.into();
        self
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

pub struct Participant;

impl Participant {
    /// Log in, acquire local media, join the room and start the coordinator.
    ///
    /// Media is acquired before joining so that a capture failure is reported
    /// before any peer sees us arrive.
    pub async fn connect(
        config: ParticipantConfig,
        relay: Arc<dyn RelayClient>,
        media_source: Arc<dyn MediaSource>,
        transports: Arc<dyn TransportFactory>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<CoordinatorHandle, ConnectError> {
        let ParticipantConfig {
            participant_id,
            room,
            credentials,
            transport,
        } = config;

        relay
            .login(&participant_id, credentials.as_deref())
            .await?;
        info!("{} logged in", participant_id);

        let local_media = match LocalMedia::acquire(media_source).await {
            Ok(media) => media,
            Err(e) => {
                error!("{} could not acquire local media: {}", participant_id, e);
                relay.logout().await;
                return Err(e.into());
            }
        };

        let relay_rx = match relay.join_room(&room).await {
            Ok(rx) => rx,
            Err(e) => {
                local_media.release().await;
                relay.logout().await;
                return Err(e.into());
            }
        };
        info!("{} joined room '{}'", participant_id, room);

        let (coordinator, handle) = Coordinator::new(
            participant_id,
            relay,
            relay_rx,
            transports,
            transport,
            local_media,
            observer,
        );
        tokio::spawn(coordinator.run());

        Ok(handle)
    }
}
