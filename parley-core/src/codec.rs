//! Conversion between [`NegotiationMessage`] and the opaque text payload the
//! relay carries.

use crate::error::CodecError;
use crate::model::NegotiationMessage;
use serde_json::Value;

pub fn encode(message: &NegotiationMessage) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(CodecError::Encode)
}

pub fn decode(payload: &str) -> Result<NegotiationMessage, CodecError> {
    let value: Value = serde_json::from_str(payload).map_err(CodecError::Malformed)?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(CodecError::MissingKind)?;
    if !NegotiationMessage::KINDS.contains(&kind) {
        return Err(CodecError::UnknownKind(kind.to_owned()));
    }

    serde_json::from_value(value).map_err(CodecError::Malformed)
}
