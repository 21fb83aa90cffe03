//! Key storage for tchat.
//!
//! [`FileKeyStore`] keeps the 64-byte `seed || public` keypair in a single
//! file readable only by the owner. [`InMemoryKeyStore`] is for tests.

use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use super::{KeyLoadError, Keypair};

/// Trait for persistent key storage.
pub trait KeyStore: Send + Sync {
    /// Load the keypair from storage.
    ///
    /// Returns `None` if no keypair has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError`] if the stored data is corrupted or
    /// inaccessible.
    fn load(&self) -> Result<Option<Keypair>, KeyLoadError>;

    /// Persist a keypair.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError`] if the keypair cannot be written.
    fn save(&self, keypair: &Keypair) -> Result<(), KeyLoadError>;

    /// Load the stored keypair, generating and saving a new one on first run.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError`] if loading or saving fails.
    fn load_or_generate(&self) -> Result<Keypair, KeyLoadError> {
        if let Some(keypair) = self.load()? {
            return Ok(keypair);
        }
        let keypair = Keypair::generate();
        self.save(&keypair)?;
        tracing::info!(service_id = %keypair.service_id(), "generated new identity key");
        Ok(keypair)
    }
}

/// File-backed key store.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    /// Key store at an explicit path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Key store at the default location (`<config_dir>/tchat/private_key`).
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::NoConfigDir`] if the platform has no config
    /// directory.
    pub fn default_location() -> Result<Self, KeyLoadError> {
        let dir = dirs::config_dir().ok_or(KeyLoadError::NoConfigDir)?;
        Ok(Self::new(dir.join("tchat").join("private_key")))
    }

    /// The file this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self) -> Result<Option<Keypair>, KeyLoadError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(KeyLoadError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        Keypair::from_keypair_bytes(&bytes).map(Some)
    }

    fn save(&self, keypair: &Keypair) -> Result<(), KeyLoadError> {
        let write_err = |source| KeyLoadError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let bytes = Zeroizing::new(keypair.to_keypair_bytes());
        write_private(&self.path, &*bytes).map_err(write_err)
    }
}

/// Write `contents` to `path`, owner read/write only.
#[cfg(unix)]
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

/// Write `contents` to `path`.
#[cfg(not(unix))]
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

/// In-memory key store for testing.
///
/// Does not persist keys beyond the lifetime of the struct.
pub struct InMemoryKeyStore {
    key: parking_lot::Mutex<Option<Zeroizing<Vec<u8>>>>,
}

impl InMemoryKeyStore {
    /// Create a new empty in-memory key store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            key: parking_lot::Mutex::new(None),
        }
    }
}

impl Default for InMemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn load(&self) -> Result<Option<Keypair>, KeyLoadError> {
        let guard = self.key.lock();
        guard
            .as_ref()
            .map(|bytes| Keypair::from_keypair_bytes(bytes))
            .transpose()
    }

    fn save(&self, keypair: &Keypair) -> Result<(), KeyLoadError> {
        *self.key.lock() = Some(Zeroizing::new(keypair.to_keypair_bytes().to_vec()));
        Ok(())
    }
}
