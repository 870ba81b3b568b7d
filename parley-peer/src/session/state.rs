use parley_core::DescriptionKind;
use std::fmt;

/// Which side of the handshake this participant plays for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Offerer,
    Answerer,
}

impl Role {
    /// Kind of description this side creates locally.
    pub fn local_description_kind(self) -> DescriptionKind {
        match self {
            Role::Offerer => DescriptionKind::Offer,
            Role::Answerer => DescriptionKind::Answer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Offerer => f.write_str("offerer"),
            Role::Answerer => f.write_str("answerer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    LocalDescriptionPending,
    AwaitingRemoteDescription,
    Connected,
    Closed,
}

impl NegotiationState {
    pub fn is_closed(self) -> bool {
        self == NegotiationState::Closed
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::LocalDescriptionPending => "local-description-pending",
            NegotiationState::AwaitingRemoteDescription => "awaiting-remote-description",
            NegotiationState::Connected => "connected",
            NegotiationState::Closed => "closed",
        };
        f.write_str(name)
    }
}
