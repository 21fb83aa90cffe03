//! Detached Ed25519 signatures over the canonical message encoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, VerifyingKey};

use crate::identity::{IdentityError, ServiceId};
use crate::message::{CodecError, Message};

/// Errors raised while decoding or checking a signed message.
#[derive(Debug, thiserror::Error)]
pub enum SignedMessageError {
    /// A field was not valid unpadded base64.
    #[error("invalid base64 in {field}: {source}")]
    Base64 {
        /// Name of the offending field.
        field: &'static str,
        /// Underlying decode error.
        source: base64::DecodeError,
    },

    /// The signature is not 64 bytes.
    #[error("invalid signature length: {0}")]
    SignatureLength(usize),

    /// The message bytes are not a JSON message.
    #[error("could not decode signed message: {0}")]
    Codec(#[from] CodecError),

    /// The author id does not carry a usable public key.
    #[error("could not recover author key: {0}")]
    Identity(#[from] IdentityError),

    /// The signature does not verify.
    #[error("signature verification failed: {0}")]
    Verification(#[from] SignatureError),
}

/// Sign the canonical bytes of a message.
///
/// Ed25519 signing is deterministic: the same key and bytes always give
/// the same signature.
#[must_use]
pub fn sign(key: &SigningKey, canonical: &[u8]) -> Signature {
    key.sign(canonical)
}

/// Verify a detached signature with strict (non-malleable) checks.
///
/// # Errors
///
/// Returns [`SignatureError`] if the signature does not match.
pub fn verify(
    key: &VerifyingKey,
    canonical: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    key.verify_strict(canonical, signature)
}

/// A message together with its canonical bytes and signature.
#[derive(Debug, Clone)]
pub struct SignedMessage {
    /// The decoded message.
    pub message: Message,
    /// The exact bytes that were signed.
    pub canonical: Vec<u8>,
    /// Detached signature over `canonical`.
    pub signature: Signature,
}

impl SignedMessage {
    /// Encode and sign `message`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the message cannot be encoded.
    pub fn new(key: &SigningKey, message: Message) -> Result<Self, CodecError> {
        let canonical = message.to_canonical_json()?;
        let signature = sign(key, &canonical);
        Ok(Self {
            message,
            canonical,
            signature,
        })
    }

    /// Rebuild a signed message from its two base64 form fields.
    ///
    /// The signature is not checked here; call [`verify_author`](Self::verify_author).
    ///
    /// # Errors
    ///
    /// Returns [`SignedMessageError`] if either field fails to decode.
    pub fn decode(signature_b64: &str, message_b64: &str) -> Result<Self, SignedMessageError> {
        let sig_bytes =
            STANDARD_NO_PAD
                .decode(signature_b64)
                .map_err(|source| SignedMessageError::Base64 {
                    field: "signature",
                    source,
                })?;
        let canonical =
            STANDARD_NO_PAD
                .decode(message_b64)
                .map_err(|source| SignedMessageError::Base64 {
                    field: "message",
                    source,
                })?;
        let sig_array: [u8; 64] = sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignedMessageError::SignatureLength(sig_bytes.len()))?;
        let message = Message::from_json(&canonical)?;
        Ok(Self {
            message,
            canonical,
            signature: Signature::from_bytes(&sig_array),
        })
    }

    /// Verify the signature against the key embedded in the author's service id.
    ///
    /// # Errors
    ///
    /// Returns [`SignedMessageError`] if the author id is not a valid service
    /// id or the signature does not match.
    pub fn verify_author(&self) -> Result<(), SignedMessageError> {
        let author = ServiceId::parse(&self.message.service_id)?;
        let key = author.public_key()?;
        verify(&key, &self.canonical, &self.signature)?;
        Ok(())
    }

    /// Base64 (standard alphabet, unpadded) of the signature bytes.
    #[must_use]
    pub fn signature_b64(&self) -> String {
        STANDARD_NO_PAD.encode(self.signature.to_bytes())
    }

    /// Base64 (standard alphabet, unpadded) of the canonical message bytes.
    #[must_use]
    pub fn message_b64(&self) -> String {
        STANDARD_NO_PAD.encode(&self.canonical)
    }
}
