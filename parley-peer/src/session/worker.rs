use crate::media::LocalMedia;
use crate::transport::{
    MediaTransport, SessionKey, TransportConfig, TransportEvent, TransportEventSink,
    TransportFactory,
};
use anyhow::{Context, Result};
use parley_core::{Candidate, Description, DescriptionKind};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Work queued for one session's transport. Executed strictly in order.
#[derive(Debug)]
pub(crate) enum TransportOp {
    /// Create a local description of the given kind and apply it.
    CreateLocalDescription(DescriptionKind),
    ApplyRemoteDescription(Description),
    AddCandidate(Candidate),
}

/// The coordinator's end of a session worker.
///
/// Dropping it cancels the worker just like [`WorkerHandle::cancel`] does.
pub(crate) struct WorkerHandle {
    /// Queue feeding the worker, in submission order.
    ops: mpsc::UnboundedSender<TransportOp>,
    /// Fired (or dropped) to stop the worker between or during operations.
    cancel: Option<oneshot::Sender<()>>,
    /// The spawned worker task.
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Queue `op`. Returns false once the worker has stopped.
    pub(crate) fn send(&self, op: TransportOp) -> bool {
        self.ops.send(op).is_ok()
    }

    /// Stop the worker. Queued operations are discarded and the operation in
    /// progress is abandoned before the transport is closed.
    pub(crate) fn cancel(mut self) -> Option<JoinHandle<()>> {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.join.take()
    }

    /// A handle over a bare queue with no task behind it.
    #[cfg(test)]
    pub(crate) fn detached(ops: mpsc::UnboundedSender<TransportOp>) -> Self {
        Self {
            ops,
            cancel: None,
            join: None,
        }
    }
}

/// Owns the media transport of one session.
///
/// The coordinator never awaits the transport itself: it queues
/// [`TransportOp`]s here and hears back through [`TransportEvent`]s. The worker
/// stops at the first failed operation or as soon as it is cancelled, and
/// closes the transport on the way out.
pub(crate) struct SessionWorker {
    /// Session this worker belongs to; tags every event it emits.
    key: SessionKey,
    transport: Box<dyn MediaTransport>,
    /// Completion and failure reports back to the coordinator.
    events: mpsc::Sender<TransportEvent>,
    ops: mpsc::UnboundedReceiver<TransportOp>,
}

impl SessionWorker {
    pub(crate) fn spawn(
        key: SessionKey,
        factory: Arc<dyn TransportFactory>,
        config: TransportConfig,
        media: LocalMedia,
        events: mpsc::Sender<TransportEvent>,
    ) -> WorkerHandle {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();

        let join = tokio::spawn(async move {
            let sink = TransportEventSink::new(key.clone(), events.clone());
            let created = tokio::select! {
                biased;
                _ = &mut cancel_rx => {
                    debug!("Session {} cancelled before its transport existed", key);
                    return;
                }
                created = factory.create(&config, sink) => created,
            };
            let transport = match created {
                Ok(t) => t,
                Err(e) => {
                    let reason = format!("{:#}", e.context("Failed to create media transport"));
                    let _ = events.send(TransportEvent::OperationFailed(key, reason)).await;
                    return;
                }
            };

            let worker = SessionWorker {
                key,
                transport,
                events,
                ops: ops_rx,
            };
            worker.run(media, cancel_rx).await;
        });

        WorkerHandle {
            ops: ops_tx,
            cancel: Some(cancel_tx),
            join: Some(join),
        }
    }

    async fn run(mut self, media: LocalMedia, mut cancel: oneshot::Receiver<()>) {
        debug!("Session worker for {} started", self.key);

        let attached =
            until_cancelled(&mut cancel, self.transport.attach_local_tracks(&media)).await;

        match attached {
            None => debug!("Session worker for {} cancelled", self.key),
            Some(Err(e)) => {
                self.report_failure(e.context("Failed to attach local tracks"))
                    .await
            }
            Some(Ok(())) => loop {
                let op = tokio::select! {
                    biased;
                    _ = &mut cancel => None,
                    op = self.ops.recv() => op,
                };
                let Some(op) = op else {
                    break;
                };
                match until_cancelled(&mut cancel, self.execute(op)).await {
                    None => {
                        debug!("Session worker for {} cancelled", self.key);
                        break;
                    }
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        self.report_failure(e).await;
                        break;
                    }
                }
            },
        }

        if let Err(e) = self.transport.close().await {
            warn!("Failed to close transport for {}: {:#}", self.key, e);
        }
        debug!("Session worker for {} finished", self.key);
    }

    async fn execute(&self, op: TransportOp) -> Result<()> {
        match op {
            TransportOp::CreateLocalDescription(kind) => {
                let description = self
                    .transport
                    .create_local_description(kind)
                    .await
                    .with_context(|| format!("Failed to create local {}", kind))?;
                self.transport
                    .set_local_description(description.clone())
                    .await
                    .with_context(|| format!("Failed to apply local {}", kind))?;
                self.emit(TransportEvent::LocalDescriptionApplied(
                    self.key.clone(),
                    description,
                ))
                .await;
            }

            TransportOp::ApplyRemoteDescription(description) => {
                let kind = description.kind;
                self.transport
                    .set_remote_description(description)
                    .await
                    .with_context(|| format!("Failed to apply remote {}", kind))?;
                self.emit(TransportEvent::RemoteDescriptionApplied(self.key.clone()))
                    .await;
            }

            TransportOp::AddCandidate(candidate) => {
                self.transport
                    .add_candidate(candidate)
                    .await
                    .context("Failed to add remote candidate")?;
            }
        }
        Ok(())
    }

    async fn report_failure(&self, error: anyhow::Error) {
        warn!("Transport for {} failed: {:#}", self.key, error);
        self.emit(TransportEvent::OperationFailed(
            self.key.clone(),
            format!("{:#}", error),
        ))
        .await;
    }

    async fn emit(&self, event: TransportEvent) {
        // The coordinator may already be gone during shutdown.
        let _ = self.events.send(event).await;
    }
}

/// Drive `work` unless `cancel` fires (or its sender is dropped) first.
async fn until_cancelled<T>(
    cancel: &mut oneshot::Receiver<()>,
    work: impl Future<Output = T>,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel => None,
        out = work => Some(out),
    }
}
