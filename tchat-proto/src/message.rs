//! Chat message type and its canonical JSON encoding.
//!
//! A [`Message`] is the single unit exchanged between peers. The same
//! canonical byte encoding is used for signing and for transmission, so
//! a signature produced over [`Message::to_canonical_json`] can be checked
//! by anyone holding the decoded bytes.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::identity::ServiceId;

/// Author id reserved for notices generated by the client itself.
///
/// The parentheses make it impossible to collide with a real service id,
/// which only contains base32 characters.
pub const SYSTEM_SERVICE_ID: &str = "(System)";

/// Error type for message encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON serialization or deserialization failed.
    #[error("invalid message JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single chat unit.
///
/// `service_id` names the author. On receipt it is whatever the peer
/// reported; nothing ties it to a signature at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Author service id (without the `.onion` suffix).
    #[serde(rename = "ServiceID")]
    pub service_id: String,
    /// Message body.
    #[serde(rename = "Content")]
    pub content: String,
}

impl Message {
    /// Build an outbound message authored by `service_id`.
    #[must_use]
    pub fn new(service_id: &ServiceId, content: impl Into<String>) -> Self {
        Self {
            service_id: service_id.as_str().to_string(),
            content: content.into(),
        }
    }

    /// Encode to the canonical byte form: compact JSON, `ServiceID` first.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if serialization fails.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a message from JSON bytes.
    ///
    /// Keys match case-insensitively. Unknown keys are ignored, and a
    /// missing or `null` field decodes as empty.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if the bytes are not a JSON object or a
    /// known field is not a string.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CodecError> {
        let fields: Map<String, Value> = serde_json::from_slice(bytes)?;
        let mut msg = Self {
            service_id: String::new(),
            content: String::new(),
        };
        for (key, value) in fields {
            let slot = if key.eq_ignore_ascii_case("ServiceID") {
                &mut msg.service_id
            } else if key.eq_ignore_ascii_case("Content") {
                &mut msg.content
            } else {
                continue;
            };
            if !value.is_null() {
                *slot = serde_json::from_value(value)?;
            }
        }
        Ok(msg)
    }
}
