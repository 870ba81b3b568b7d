use crate::media::LocalMedia;
use crate::transport::{TransportConfig, TransportEventSink};
use anyhow::Result;
use async_trait::async_trait;
use parley_core::{Candidate, Description, DescriptionKind};

/// One media-transport session towards one remote participant.
///
/// The coordinator drives it but never implements it: description generation
/// and network-path discovery belong to the transport. Discovered candidates
/// and received tracks are reported through the [`TransportEventSink`] the
/// factory was given.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn attach_local_tracks(&self, media: &LocalMedia) -> Result<()>;

    async fn create_local_description(&self, kind: DescriptionKind) -> Result<Description>;

    async fn set_local_description(&self, description: Description) -> Result<()>;

    async fn set_remote_description(&self, description: Description) -> Result<()>;

    async fn add_candidate(&self, candidate: Candidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn create(
        &self,
        config: &TransportConfig,
        events: TransportEventSink,
    ) -> Result<Box<dyn MediaTransport>>;
}
