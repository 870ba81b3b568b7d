pub use parley_core::{NegotiationMessage, ParticipantId, RoomId};

pub mod model {
    pub use parley_core::model::*;
}

pub mod codec {
    pub use parley_core::{CodecError, decode, encode};
}

#[cfg(feature = "peer")]
pub mod peer {
    pub use parley_peer::*;
}
