//! Configuration for the tchat relay.
//!
//! Priority, highest first: CLI arguments (and their `env` fallbacks), the
//! TOML file (`~/.config/tchat-relay/config.toml`), compiled defaults.

use std::path::PathBuf;

/// Errors that can occur when loading relay configuration.
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

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Top-level TOML config file structure for the relay.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RelayConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section of the relay config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    read_cookie: Option<String>,
    max_form_size: Option<usize>,
    broadcast_capacity: Option<usize>,
}

/// CLI arguments for the relay.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Local relay for tchat")]
pub struct RelayCliArgs {
    /// Address to bind to.
    #[arg(short, long, env = "TCHAT_RELAY_ADDR")]
    pub bind: Option<String>,

    /// Cookie readers must present on `/read`.
    #[arg(long, env = "TCHAT_RELAY_COOKIE")]
    pub cookie: Option<String>,

    /// Path to config file (default: `~/.config/tchat-relay/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TCHAT_RELAY_LOG")]
    pub log_level: String,
}

/// Fully resolved relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind the server to.
    pub bind_addr: String,
    /// Cookie readers must present.
    pub read_cookie: String,
    /// Largest accepted `/send` body in bytes.
    pub max_form_size: usize,
    /// Messages buffered per lagging reader before it starts dropping.
    pub broadcast_capacity: usize,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            read_cookie: String::new(),
            max_form_size: 64 * 1024,
            broadcast_capacity: 256,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Merge CLI args, env vars and the TOML file.
    ///
    /// An explicit `--config` that does not exist is an error; a missing
    /// default file is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &RelayCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    fn resolve(cli: &RelayCliArgs, file: &RelayConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            read_cookie: cli
                .cookie
                .clone()
                .or_else(|| file.server.read_cookie.clone())
                .unwrap_or(defaults.read_cookie),
            max_form_size: file
                .server
                .max_form_size
                .unwrap_or(defaults.max_form_size),
            broadcast_capacity: file
                .server
                .broadcast_capacity
                .unwrap_or(defaults.broadcast_capacity)
                .max(1),
            log_level: cli.log_level.clone(),
        }
    }
}

fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<RelayConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(RelayConfigFile::default());
        };
        config_dir.join("tchat-relay").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
