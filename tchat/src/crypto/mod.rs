//! Key material for tchat.
//!
//! Defines the long-term Ed25519 [`Keypair`] and the [`KeyLoadError`]
//! taxonomy. The private half is used only for signing outbound messages;
//! the public half only for deriving this client's service id.

pub mod keys;

use std::path::PathBuf;

use ed25519_dalek::{KEYPAIR_LENGTH, SigningKey, VerifyingKey};
use tchat_proto::identity::ServiceId;

/// Errors that can occur while loading or storing key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyLoadError {
    /// The key file could not be read.
    #[error("failed to read key file {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The key file could not be written.
    #[error("failed to write key file {path}: {source}")]
    Write {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The stored key has the wrong size.
    #[error("invalid key length: expected {KEYPAIR_LENGTH} bytes, got {0}")]
    InvalidLength(usize),

    /// The stored public half does not belong to the stored seed.
    #[error("stored public key does not match private key")]
    Mismatch,

    /// Could not determine the user's config directory.
    #[error("could not determine config directory (no HOME or XDG_CONFIG_HOME)")]
    NoConfigDir,
}

/// A long-term Ed25519 identity keypair.
///
/// `SigningKey` zeroizes its secret on drop.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair using the system's CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut rand_core::OsRng),
        }
    }

    /// Wrap an existing signing key.
    #[must_use]
    pub const fn from_signing_key(signing: SigningKey) -> Self {
        Self { signing }
    }

    /// Load from the 64-byte `seed || public` layout.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::InvalidLength`] for any other size and
    /// [`KeyLoadError::Mismatch`] if the public half is not derived from
    /// the seed.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, KeyLoadError> {
        let array: &[u8; KEYPAIR_LENGTH] = bytes
            .try_into()
            .map_err(|_| KeyLoadError::InvalidLength(bytes.len()))?;
        let signing =
            SigningKey::from_keypair_bytes(array).map_err(|_| KeyLoadError::Mismatch)?;
        Ok(Self { signing })
    }

    /// Return the 64-byte `seed || public` encoding.
    ///
    /// The caller is responsible for wiping the returned buffer.
    #[must_use]
    pub fn to_keypair_bytes(&self) -> [u8; KEYPAIR_LENGTH] {
        self.signing.to_keypair_bytes()
    }

    /// The private signing key.
    #[must_use]
    pub const fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    /// The public verifying key.
    #[must_use]
    pub fn public_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// The service id this keypair is addressed by.
    #[must_use]
    pub fn service_id(&self) -> ServiceId {
        ServiceId::from_verifying_key(&self.public_key())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("service_id", &self.service_id())
            .finish_non_exhaustive()
    }
}
