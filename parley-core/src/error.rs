use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("malformed negotiation payload: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("negotiation payload has no `type` field")]
    MissingKind,
    #[error("unrecognised negotiation message type `{0}`")]
    UnknownKind(String),
    #[error("failed to serialize negotiation message: {0}")]
    Encode(#[source] serde_json::Error),
}
