pub mod codec;
pub mod error;
pub mod model;

pub use codec::{decode, encode};
pub use error::CodecError;
pub use model::*;
