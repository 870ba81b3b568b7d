pub mod coordinator;
pub mod error;
pub mod media;
pub mod participant;
pub mod relay;
pub mod session;
pub mod transport;

pub use coordinator::{Coordinator, CoordinatorHandle, NoopObserver, SessionObserver};
pub use error::{ConnectError, CoordinatorError, MediaError, NegotiationError, RelayError};
pub use participant::{Participant, ParticipantConfig};
