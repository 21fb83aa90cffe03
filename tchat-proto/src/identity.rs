//! Peer identity: v3 onion service ids derived from Ed25519 public keys.
//!
//! A service id is `base32(pubkey || checksum || version)` in lowercase,
//! where `checksum = SHA3-256(".onion checksum" || pubkey || version)[..2]`
//! and `version = 0x03`. The derivation is one-way from the public key and
//! uses no private input, so the same key always yields the same id.

use std::fmt;

use data_encoding::BASE32_NOPAD;
use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// Domain-like suffix accepted (and stripped) on destination addresses.
pub const ONION_SUFFIX: &str = ".onion";

/// Length of a service id in characters (35 bytes in base32).
pub const SERVICE_ID_LEN: usize = 56;

const CHECKSUM_PREFIX: &[u8] = b".onion checksum";
const VERSION: u8 = 0x03;
const CHECKSUM_LEN: usize = 2;
const DECODED_LEN: usize = PUBLIC_KEY_LENGTH + CHECKSUM_LEN + 1;

/// Errors from deriving or parsing a service id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The public key is not 32 bytes long.
    #[error("invalid public key length: expected {PUBLIC_KEY_LENGTH} bytes, got {len}")]
    InvalidKeyLength {
        /// Length that was supplied.
        len: usize,
    },

    /// The public key bytes do not encode a curve point.
    #[error("malformed public key: not a valid ed25519 point")]
    MalformedKey,

    /// The string is not a syntactically valid service id.
    #[error("invalid service id {id:?}: {reason}")]
    InvalidServiceId {
        /// The rejected input (suffix stripped).
        id: String,
        /// What check failed.
        reason: &'static str,
    },
}

/// A peer-addressable identifier derived from an Ed25519 public key.
///
/// Always stored lowercase and without the `.onion` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Derive the service id for an already-validated public key.
    #[must_use]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let pubkey = key.as_bytes();
        let mut decoded = [0u8; DECODED_LEN];
        decoded[..PUBLIC_KEY_LENGTH].copy_from_slice(pubkey);
        decoded[PUBLIC_KEY_LENGTH..PUBLIC_KEY_LENGTH + CHECKSUM_LEN]
            .copy_from_slice(&checksum(pubkey));
        decoded[DECODED_LEN - 1] = VERSION;
        Self(BASE32_NOPAD.encode(&decoded).to_ascii_lowercase())
    }

    /// Parse a service id, with or without the `.onion` suffix.
    ///
    /// Input is case-insensitive. The length, alphabet, version byte and
    /// checksum are all verified.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidServiceId`] if any check fails.
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let id = strip_onion_suffix(input.trim()).to_ascii_lowercase();
        let invalid = |reason| IdentityError::InvalidServiceId {
            id: id.clone(),
            reason,
        };

        if id.len() != SERVICE_ID_LEN {
            return Err(invalid("expected 56 characters"));
        }
        let decoded = BASE32_NOPAD
            .decode(id.to_ascii_uppercase().as_bytes())
            .map_err(|_| invalid("not base32"))?;
        if decoded.len() != DECODED_LEN {
            return Err(invalid("wrong decoded length"));
        }
        if decoded[DECODED_LEN - 1] != VERSION {
            return Err(invalid("unsupported version"));
        }
        let pubkey = &decoded[..PUBLIC_KEY_LENGTH];
        if decoded[PUBLIC_KEY_LENGTH..PUBLIC_KEY_LENGTH + CHECKSUM_LEN] != checksum(pubkey) {
            return Err(invalid("checksum mismatch"));
        }

        Ok(Self(id))
    }

    /// Recover the public key embedded in this id.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::MalformedKey`] if the embedded bytes are not
    /// a curve point, or [`IdentityError::InvalidServiceId`] if the id does
    /// not decode.
    pub fn public_key(&self) -> Result<VerifyingKey, IdentityError> {
        let decoded = BASE32_NOPAD
            .decode(self.0.to_ascii_uppercase().as_bytes())
            .map_err(|_| IdentityError::InvalidServiceId {
                id: self.0.clone(),
                reason: "not base32",
            })?;
        let key: [u8; PUBLIC_KEY_LENGTH] = decoded
            .get(..PUBLIC_KEY_LENGTH)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| IdentityError::InvalidServiceId {
                id: self.0.clone(),
                reason: "wrong decoded length",
            })?;
        VerifyingKey::from_bytes(&key).map_err(|_| IdentityError::MalformedKey)
    }

    /// Return the bare id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the id with the `.onion` suffix appended.
    #[must_use]
    pub fn onion_address(&self) -> String {
        format!("{}{ONION_SUFFIX}", self.0)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the service id for a raw public key.
///
/// # Errors
///
/// Returns [`IdentityError::InvalidKeyLength`] if `public_key` is not 32
/// bytes, or [`IdentityError::MalformedKey`] if it is not a curve point.
pub fn derive_service_id(public_key: &[u8]) -> Result<ServiceId, IdentityError> {
    let bytes: [u8; PUBLIC_KEY_LENGTH] =
        public_key
            .try_into()
            .map_err(|_| IdentityError::InvalidKeyLength {
                len: public_key.len(),
            })?;
    let key = VerifyingKey::from_bytes(&bytes).map_err(|_| IdentityError::MalformedKey)?;
    Ok(ServiceId::from_verifying_key(&key))
}

/// Strip a single trailing `.onion` from a destination address.
#[must_use]
pub fn strip_onion_suffix(address: &str) -> &str {
    address.strip_suffix(ONION_SUFFIX).unwrap_or(address)
}

fn checksum(pubkey: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha3_256::new();
    hasher.update(CHECKSUM_PREFIX);
    hasher.update(pubkey);
    hasher.update([VERSION]);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}
