mod ice;
mod media;
mod negotiation;
mod participant;
mod room;

pub use ice::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2, IceServerConfig};
pub use media::{RemoteTrack, TrackKind};
pub use negotiation::{Candidate, Description, DescriptionKind, NegotiationMessage};
pub use participant::ParticipantId;
pub use room::RoomId;
