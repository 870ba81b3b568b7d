use crate::media::LocalMedia;
use crate::transport::{
    MediaTransport, SessionKey, TransportConfig, TransportEventSink, TransportFactory,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parley_core::{Candidate, Description, DescriptionKind, RemoteTrack, TrackKind};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Creates [`WebRtcTransport`]s backed by the `webrtc` crate.
#[derive(Debug, Clone, Default)]
pub struct WebRtcTransportFactory;

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        config: &TransportConfig,
        events: TransportEventSink,
    ) -> Result<Box<dyn MediaTransport>> {
        let transport = WebRtcTransport::new(config, events).await?;
        Ok(Box::new(transport))
    }
}

type SharedTrack = Arc<dyn TrackLocal + Send + Sync>;

pub struct WebRtcTransport {
    key: SessionKey,
    peer_connection: Arc<RTCPeerConnection>,
    /// Mirrors the local enabled flags onto the senders. Stopped on close.
    toggles: Mutex<Option<JoinHandle<()>>>,
}

impl WebRtcTransport {
    pub async fn new(config: &TransportConfig, events: TransportEventSink) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let key = events.key().clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let key = key.clone();
                Box::pin(async move {
                    match s {
                        RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected => {
                            warn!("Media path to {} is {:?}", key, s);
                        }
                        _ => info!("Media path to {} is {:?}", key, s),
                    }
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();

            Box::pin(async move {
                // None marks the end of gathering.
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events.candidate_discovered(candidate_from_init(init)).await;
            })
        }));

        let track_events = events.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        other => {
                            debug!("Ignoring remote track of kind {:?}", other);
                            return;
                        }
                    };
                    events
                        .remote_track_received(RemoteTrack {
                            id: track.id(),
                            stream_id: track.stream_id(),
                            kind,
                        })
                        .await;
                })
            },
        ));

        Ok(Self {
            key: events.key().clone(),
            peer_connection,
            toggles: Mutex::new(None),
        })
    }
}

/// Keep each sender's track in line with its enabled flag. A disabled track
/// stays negotiated; its sender just has no track to send.
async fn follow_enabled(
    key: SessionKey,
    senders: Vec<(Arc<RTCRtpSender>, SharedTrack)>,
    mut enabled: watch::Receiver<Vec<bool>>,
) {
    let mut sending = vec![true; senders.len()];
    loop {
        let flags = enabled.borrow_and_update().clone();
        for (i, (sender, track)) in senders.iter().enumerate() {
            let want = flags.get(i).copied().unwrap_or(true);
            if want == sending[i] {
                continue;
            }
            match sender.replace_track(want.then(|| track.clone())).await {
                Ok(()) => {
                    sending[i] = want;
                    debug!("Track {} towards {} sending: {}", track.id(), key, want);
                }
                Err(e) => warn!("Failed to toggle track {} towards {}: {}", track.id(), key, e),
            }
        }
        if enabled.changed().await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl MediaTransport for WebRtcTransport {
    async fn attach_local_tracks(&self, media: &LocalMedia) -> Result<()> {
        let mut senders = Vec::with_capacity(media.tracks().len());
        for track in media.tracks() {
            let mime_type = match track.kind {
                TrackKind::Audio => MIME_TYPE_OPUS,
                TrackKind::Video => MIME_TYPE_VP8,
            };
            let local: SharedTrack = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime_type.to_owned(),
                    ..Default::default()
                },
                track.id.clone(),
                track.stream_id.clone(),
            ));
            let sender = self
                .peer_connection
                .add_track(local.clone())
                .await
                .with_context(|| format!("Failed to attach local {} track", track.kind))?;
            senders.push((sender, local));
        }

        let task = tokio::spawn(follow_enabled(self.key.clone(), senders, media.subscribe()));
        if let Some(previous) = self.toggles.lock().await.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn create_local_description(&self, kind: DescriptionKind) -> Result<Description> {
        let description = match kind {
            DescriptionKind::Offer => self.peer_connection.create_offer(None).await?,
            DescriptionKind::Answer => self.peer_connection.create_answer(None).await?,
        };
        Ok(Description {
            kind,
            sdp: description.sdp,
        })
    }

    async fn set_local_description(&self, description: Description) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc_description(description)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, description: Description) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc_description(description)?)
            .await?;
        Ok(())
    }

    async fn add_candidate(&self, candidate: Candidate) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: candidate.username_fragment,
            })
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(task) = self.toggles.lock().await.take() {
            task.abort();
        }
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn to_rtc_description(description: Description) -> Result<RTCSessionDescription> {
    let rtc = match description.kind {
        DescriptionKind::Offer => RTCSessionDescription::offer(description.sdp),
        DescriptionKind::Answer => RTCSessionDescription::answer(description.sdp),
    };
    rtc.context("Malformed session description")
}

fn candidate_from_init(init: RTCIceCandidateInit) -> Candidate {
    Candidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}
