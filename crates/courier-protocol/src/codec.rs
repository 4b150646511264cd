//! Codec for the Courier wire protocol.
//!
//! Inbound frames are tagged JSON objects. Decoding resolves the tag first
//! so that unknown event types can be ignored and validation failures can be
//! attributed to the operation that failed.

use serde_json::Value;
use thiserror::Error;

use crate::events::{ClientEvent, ServerEvent};

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is not a JSON object.
    #[error("event is not a JSON object")]
    NotAnObject,

    /// Frame has no string `type` field.
    #[error("event has no type field")]
    MissingType,

    /// A known event type with a malformed payload.
    #[error("malformed {event_type} payload: {source}")]
    InvalidPayload {
        /// The wire tag of the failed operation.
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// Frame is not valid JSON, or an outbound event failed to serialize.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result of decoding one inbound frame.
#[derive(Debug)]
pub enum Inbound {
    /// A recognized, validated event.
    Event(ClientEvent),
    /// An unrecognized event type, carried for logging.
    Unknown(String),
}

/// Decode one inbound event from a text frame.
///
/// Unknown event types decode to [`Inbound::Unknown`] rather than an error;
/// the router logs and ignores them. A known type with missing or malformed
/// required fields is a [`ProtocolError::InvalidPayload`] naming the
/// operation, so the caller can emit the matching `*_error` event.
///
/// # Errors
///
/// Returns an error if the frame is not a tagged JSON object or a known
/// event's payload fails validation.
pub fn decode_client(text: &str) -> Result<Inbound, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;

    if !value.is_object() {
        return Err(ProtocolError::NotAnObject);
    }

    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    if !ClientEvent::is_known_type(&event_type) {
        return Ok(Inbound::Unknown(event_type));
    }

    match serde_json::from_value::<ClientEvent>(value) {
        Ok(event) => Ok(Inbound::Event(event)),
        Err(source) => Err(ProtocolError::InvalidPayload { event_type, source }),
    }
}

/// Encode an outbound event to a text frame.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_server(event: &ServerEvent) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_event() {
        let text = r#"{"type":"authenticate","userId":"u1","nickname":"Alice","token":"t"}"#;
        match decode_client(text).unwrap() {
            Inbound::Event(ClientEvent::Authenticate {
                user_id,
                nickname,
                token,
            }) => {
                assert_eq!(user_id, "u1");
                assert_eq!(nickname, "Alice");
                assert_eq!(token, "t");
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_type() {
        let text = r#"{"type":"send_message","chatId":"c1"}"#;
        match decode_client(text).unwrap() {
            Inbound::Unknown(event_type) => assert_eq!(event_type, "send_message"),
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_missing_required_field() {
        let text = r#"{"type":"join_chat","userId":"u1"}"#;
        match decode_client(text) {
            Err(ProtocolError::InvalidPayload { event_type, .. }) => {
                assert_eq!(event_type, "join_chat");
            }
            other => panic!("expected InvalidPayload, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_missing_type() {
        match decode_client(r#"{"chatId":"c1"}"#) {
            Err(ProtocolError::MissingType) => {}
            other => panic!("expected MissingType, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_not_an_object() {
        match decode_client(r#"["authenticate"]"#) {
            Err(ProtocolError::NotAnObject) => {}
            other => panic!("expected NotAnObject, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_malformed_json() {
        match decode_client("{nope") {
            Err(ProtocolError::Json(_)) => {}
            other => panic!("expected Json error, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_server_event() {
        let text = encode_server(&ServerEvent::user_stopped_typing("u1", "c1")).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "user_stopped_typing");
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["chatId"], "c1");
    }
}
