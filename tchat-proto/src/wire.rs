//! HTTP/WebSocket protocol constants and the `/send` form body.
//!
//! Two send variants exist and exactly one is used per deployment:
//!
//! - **Signed**: `signature` + `message`, both unpadded base64. The peer
//!   checks the signature against the author's service id.
//! - **Private**: `destination` + `message` (raw JSON), posted to a trusted
//!   local daemon that authenticates the channel itself.

use std::collections::HashMap;
use std::hash::BuildHasher;

use crate::message::{CodecError, Message};
use crate::signing::{SignedMessage, SignedMessageError};

/// Path of the inbound WebSocket stream.
pub const READ_PATH: &str = "/read";

/// Path of the outbound send endpoint.
pub const SEND_PATH: &str = "/send";

/// Reply frame that admits a client after a valid read cookie.
pub const ACCEPTANCE_TOKEN: &str = "accepted";

/// Reply frame sent by the relay for an invalid read cookie.
pub const REJECTION_TOKEN: &str = "rejected";

/// Errors decoding a `/send` form body.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// Neither field pair is present.
    #[error("form must carry either signature+message or destination+message")]
    MissingFields,

    /// The signed variant failed to decode.
    #[error("invalid signed form: {0}")]
    Signed(#[from] SignedMessageError),

    /// The private variant carried invalid message JSON.
    #[error("invalid private form: {0}")]
    Private(#[from] CodecError),
}

/// The body of a `POST /send` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendForm {
    /// Signature-authenticated variant.
    Signed {
        /// Base64 of the detached signature.
        signature: String,
        /// Base64 of the canonical message JSON.
        message: String,
    },
    /// Channel-authenticated variant.
    Private {
        /// Peer service id, without suffix.
        destination: String,
        /// Raw canonical message JSON.
        message: String,
    },
}

impl SendForm {
    /// Build the signed variant from an already-signed message.
    #[must_use]
    pub fn signed(signed: &SignedMessage) -> Self {
        Self::Signed {
            signature: signed.signature_b64(),
            message: signed.message_b64(),
        }
    }

    /// Build the private variant.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the message cannot be encoded.
    pub fn private(destination: &str, message: &Message) -> Result<Self, CodecError> {
        let json = message.to_canonical_json()?;
        Ok(Self::Private {
            destination: destination.to_string(),
            message: String::from_utf8_lossy(&json).into_owned(),
        })
    }

    /// Form fields in wire order.
    #[must_use]
    pub const fn fields(&self) -> [(&'static str, &str); 2] {
        match self {
            Self::Signed { signature, message } => {
                [("signature", signature.as_str()), ("message", message.as_str())]
            }
            Self::Private {
                destination,
                message,
            } => [
                ("destination", destination.as_str()),
                ("message", message.as_str()),
            ],
        }
    }

    /// Classify decoded form fields. `signature` wins if both kinds appear.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::MissingFields`] if neither variant is complete.
    pub fn from_fields<S: BuildHasher>(
        fields: &HashMap<String, String, S>,
    ) -> Result<Self, FormError> {
        let message = fields.get("message").ok_or(FormError::MissingFields)?;
        if let Some(signature) = fields.get("signature") {
            return Ok(Self::Signed {
                signature: signature.clone(),
                message: message.clone(),
            });
        }
        if let Some(destination) = fields.get("destination") {
            return Ok(Self::Private {
                destination: destination.clone(),
                message: message.clone(),
            });
        }
        Err(FormError::MissingFields)
    }

    /// Decode the carried message.
    ///
    /// Signed forms are verified against the author's service id; private
    /// forms are taken as-is.
    ///
    /// # Errors
    ///
    /// Returns [`FormError`] if decoding or verification fails.
    pub fn open(&self) -> Result<Message, FormError> {
        match self {
            Self::Signed { signature, message } => {
                let signed = SignedMessage::decode(signature, message)?;
                signed.verify_author()?;
                Ok(signed.message)
            }
            Self::Private { message, .. } => Ok(Message::from_json(message.as_bytes())?),
        }
    }
}
