mod memory_relay;
mod relay_client;
mod relay_event;

pub use memory_relay::*;
pub use relay_client::*;
pub use relay_event::*;
