//! Configuration for the tchat client.
//!
//! Connection parameters live in a JSON file
//! (`~/.config/tchat/config.json` by default):
//!
//! ```json
//! {
//!   "Tor": { "ProxyAddress": "127.0.0.1:9050" },
//!   "ServerAddress": "127.0.0.1:8080",
//!   "PrivateServerAddress": "127.0.0.1:8081",
//!   "ReadCookie": "..."
//! }
//! ```
//!
//! The file is required. If `Tor.ProxyAddress` is empty it is filled with
//! [`DEFAULT_PROXY_ADDRESS`] and the file is rewritten with the default.
//! Process-level options come from the command line ([`CliArgs`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tchat_proto::wire::READ_PATH;
use url::Url;

use crate::crypto::keys::write_private;

/// Proxy used when the config file leaves `Tor.ProxyAddress` empty.
pub const DEFAULT_PROXY_ADDRESS: &str = "127.0.0.1:9050";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write the defaulted configuration back.
    #[error("failed to write config file {path}: {source}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse or serialize the JSON configuration.
    #[error("failed to parse config file: {0}")]
    ParseJson(#[from] serde_json::Error),

    /// A required field is empty.
    #[error("config field {0} must not be empty")]
    MissingField(&'static str),

    /// An address does not form a valid URL.
    #[error("invalid address {address:?}: {source}")]
    InvalidAddress {
        /// Offending address.
        address: String,
        /// Parse failure.
        source: url::ParseError,
    },

    /// Could not determine the user's config directory.
    #[error("could not determine config directory (no HOME or XDG_CONFIG_HOME)")]
    NoConfigDir,
}

/// `Tor` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TorConfig {
    /// SOCKS5 proxy `host:port` of the local Tor daemon.
    pub proxy_address: String,
}

/// The client's connection parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Config {
    /// Tor proxy settings.
    pub tor: TorConfig,
    /// `host:port` of the relay serving the `/read` stream.
    pub server_address: String,
    /// `host:port` of a trusted local daemon accepting unsigned sends.
    ///
    /// When set, sends go here instead of to the peer's onion service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_server_address: Option<String>,
    /// Pre-shared token sent as the first frame of the `/read` stream.
    pub read_cookie: String,
}

/// How outbound messages reach the peer. Exactly one applies per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendPolicy {
    /// Sign and POST to `http://<peer>.onion/send` through the Tor proxy.
    Signed {
        /// SOCKS5 proxy `host:port`.
        proxy_address: String,
    },
    /// POST unsigned to a trusted daemon at `http://<addr>/send`.
    PrivateChannel {
        /// Daemon `host:port`.
        server_address: String,
    },
}

impl Config {
    /// Load the config file, defaulting and persisting the proxy address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or
    /// rewritten, or if `ServerAddress` is empty.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_slice(&contents)?;

        if config.apply_defaults() {
            tracing::info!(
                path = %path.display(),
                proxy = DEFAULT_PROXY_ADDRESS,
                "proxy address missing, writing default back to config file"
            );
            config.save(path)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Write this config to `path` as JSON, owner read/write only.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let bytes = serde_json::to_vec(self)?;
        write_private(path, &bytes).map_err(|source| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fill in defaulted fields. Returns `true` if anything changed.
    fn apply_defaults(&mut self) -> bool {
        if self.tor.proxy_address.trim().is_empty() {
            self.tor.proxy_address = DEFAULT_PROXY_ADDRESS.to_string();
            return true;
        }
        false
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server_address.trim().is_empty() {
            return Err(ConfigError::MissingField("ServerAddress"));
        }
        Ok(())
    }

    /// The WebSocket URL of the relay's read stream.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `ServerAddress` does not
    /// form a valid URL.
    pub fn read_url(&self) -> Result<Url, ConfigError> {
        let address = self.server_address.trim();
        Url::parse(&format!("ws://{address}{READ_PATH}")).map_err(|source| {
            ConfigError::InvalidAddress {
                address: address.to_string(),
                source,
            }
        })
    }

    /// The active send policy: private channel if configured, else signed.
    #[must_use]
    pub fn send_policy(&self) -> SendPolicy {
        match self.private_server_address.as_deref().map(str::trim) {
            Some(addr) if !addr.is_empty() => SendPolicy::PrivateChannel {
                server_address: addr.to_string(),
            },
            _ => SendPolicy::Signed {
                proxy_address: self.tor.proxy_address.clone(),
            },
        }
    }
}

/// Default config file path (`<config_dir>/tchat/config.json`).
///
/// # Errors
///
/// Returns [`ConfigError::NoConfigDir`] if the platform has no config dir.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(dir.join("tchat").join("config.json"))
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Chat with a peer over its onion service")]
pub struct CliArgs {
    /// Peer service id to chat with (a trailing `.onion` is stripped).
    pub destination: String,

    /// Path to config file (default: `~/.config/tchat/config.json`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the private key file (default: `~/.config/tchat/private_key`).
    #[arg(long)]
    pub keys: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TCHAT_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/tchat.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the config file path: `--config` or the default location.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] if no path was given and the
    /// default cannot be determined.
    pub fn config_path(&self) -> Result<PathBuf, ConfigError> {
        self.config
            .as_ref()
            .map_or_else(default_config_path, |p| Ok(p.clone()))
    }
}
