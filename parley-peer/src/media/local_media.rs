use crate::error::MediaError;
use async_trait::async_trait;
use parley_core::TrackKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::info;

/// A locally captured track that every session attaches read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

/// Camera/microphone capture. Implemented by the surrounding application.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> Result<Vec<LocalTrack>, MediaError>;

    /// Stop capturing. Called once, when the participant leaves or fails to
    /// join after acquiring.
    async fn release(&self) {}
}

struct LocalMediaInner {
    tracks: Vec<LocalTrack>,
    /// Enabled flag per track, indexed like `tracks`.
    enabled: watch::Sender<Vec<bool>>,
    /// The device backend, told to stop on release.
    source: Option<Arc<dyn MediaSource>>,
    released: AtomicBool,
}

/// The shared local capture handle.
///
/// Acquired once per participant and cloned into every session; only the
/// local leave releases it. Tracks start enabled. Disabling a kind keeps the
/// track attached but stops sending it to every peer, like the camera and
/// microphone toggles of a call UI.
#[derive(Clone)]
pub struct LocalMedia {
    inner: Arc<LocalMediaInner>,
}

impl LocalMedia {
    pub async fn acquire(source: Arc<dyn MediaSource>) -> Result<Self, MediaError> {
        let tracks = source.acquire().await?;
        if tracks.is_empty() {
            source.release().await;
            return Err(MediaError::NoTracks);
        }
        info!("Acquired {} local track(s)", tracks.len());
        Ok(Self::build(tracks, Some(source)))
    }

    /// Wrap tracks that have no capture backend behind them.
    pub fn from_tracks(tracks: Vec<LocalTrack>) -> Self {
        Self::build(tracks, None)
    }

    fn build(tracks: Vec<LocalTrack>, source: Option<Arc<dyn MediaSource>>) -> Self {
        let (enabled, _) = watch::channel(vec![true; tracks.len()]);
        Self {
            inner: Arc::new(LocalMediaInner {
                tracks,
                enabled,
                source,
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.inner.tracks
    }

    /// Turn every track of `kind` on or off. Returns false if there is no
    /// such track.
    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) -> bool {
        let indices: Vec<usize> = self
            .inner
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind == kind)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return false;
        }

        let changed = self.inner.enabled.send_if_modified(|flags| {
            let mut changed = false;
            for &i in &indices {
                if flags[i] != enabled {
                    flags[i] = enabled;
                    changed = true;
                }
            }
            changed
        });
        if changed {
            info!(
                "Local {} {}",
                kind,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        true
    }

    /// Whether the tracks of `kind` are being sent. `None` if there is no
    /// such track.
    pub fn is_enabled(&self, kind: TrackKind) -> Option<bool> {
        let flags = self.inner.enabled.borrow();
        let mut of_kind = self
            .inner
            .tracks
            .iter()
            .zip(flags.iter())
            .filter(|(t, _)| t.kind == kind)
            .peekable();
        of_kind.peek()?;
        Some(of_kind.any(|(_, enabled)| *enabled))
    }

    /// Watch the enabled flags, indexed like [`LocalMedia::tracks`].
    pub fn subscribe(&self) -> watch::Receiver<Vec<bool>> {
        self.inner.enabled.subscribe()
    }

    /// Release the capture. Only the first call reaches the source.
    pub async fn release(&self) {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(source) = &self.inner.source {
            source.release().await;
        }
        info!("Released local capture");
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }
}

/// Yields one video and one audio track without touching any device.
#[derive(Debug, Clone)]
pub struct SyntheticMediaSource {
    stream_id: String,
}

impl SyntheticMediaSource {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }
}

impl Default for SyntheticMediaSource {
    fn default() -> Self {
        Self::new("parley-local")
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self) -> Result<Vec<LocalTrack>, MediaError> {
        Ok([TrackKind::Video, TrackKind::Audio]
            .into_iter()
            .map(|kind| LocalTrack {
                id: format!("{}-{}", self.stream_id, kind),
                stream_id: self.stream_id.clone(),
                kind,
            })
            .collect())
    }
}
