use parley_core::ParticipantId;

/// Notifications the relay delivers for a joined room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Another participant joined the room.
    MemberJoined(ParticipantId),

    /// A participant left the room.
    MemberLeft(ParticipantId),

    /// An opaque payload sent directly to us.
    MessageFromPeer {
        sender: ParticipantId,
        payload: String,
    },
}
