use crate::session::SessionSnapshot;
use tokio::sync::oneshot;

/// Requests from a [`super::CoordinatorHandle`] to the coordinator loop.
#[derive(Debug)]
pub enum CoordinatorCommand {
    Snapshot {
        reply: oneshot::Sender<Vec<SessionSnapshot>>,
    },

    /// Local leave: close every session, leave the relay, release capture.
    Leave { reply: oneshot::Sender<()> },
}
