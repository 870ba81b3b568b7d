mod peer_session;
mod state;
mod worker;

pub use peer_session::*;
pub use state::*;
pub(crate) use worker::*;
