use crate::session::NegotiationState;
use parley_core::{CodecError, DescriptionKind, ParticipantId};
use thiserror::Error;

/// Outcome of handling one negotiation event for one remote participant.
///
/// Only `NegotiationFailed` closes a session; the other variants are logged and
/// the offending message is dropped.
#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("undecodable payload from {peer}: {source}")]
    Decode {
        peer: ParticipantId,
        #[source]
        source: CodecError,
    },
    #[error("duplicate {kind} description from {peer}")]
    DuplicateDescription {
        peer: ParticipantId,
        kind: DescriptionKind,
    },
    #[error("stale {kind} message from {peer}: no active session")]
    StaleMessage {
        peer: ParticipantId,
        kind: &'static str,
    },
    #[error("{kind} message from {peer} arrived out of order (session is {state})")]
    OutOfOrder {
        peer: ParticipantId,
        kind: &'static str,
        state: NegotiationState,
    },
    #[error("negotiation with {peer} failed: {reason}")]
    NegotiationFailed { peer: ParticipantId, reason: String },
}

impl NegotiationError {
    pub fn peer(&self) -> &ParticipantId {
        match self {
            NegotiationError::Decode { peer, .. }
            | NegotiationError::DuplicateDescription { peer, .. }
            | NegotiationError::StaleMessage { peer, .. }
            | NegotiationError::OutOfOrder { peer, .. }
            | NegotiationError::NegotiationFailed { peer, .. } => peer,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("relay rejected login for {0}: {1}")]
    Auth(ParticipantId, String),
    #[error("relay error: {0}")]
    Relay(String),
    #[error("not logged in to the relay")]
    NotLoggedIn,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("local media unavailable: {0}")]
    Unavailable(String),
    #[error("local media source produced no tracks")]
    NoTracks,
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error(transparent)]
    Media(#[from] MediaError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("coordinator has shut down")]
    Closed,
}
