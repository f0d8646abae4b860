//! Configuration system for the `PlayMate` relay.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/playmate-relay/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

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

    /// A value was present but unusable.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending setting.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

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
    path: Option<String>,
    normalize_path: Option<bool>,
    max_frame_size: Option<usize>,
    ping_interval_secs: Option<u64>,
    idle_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the relay server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "PlayMate realtime relay")]
pub struct RelayCliArgs {
    /// Address to bind the relay server to.
    #[arg(short, long, env = "PLAYMATE_RELAY_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/playmate-relay/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// URL path that accepts the WebSocket upgrade.
    #[arg(long, env = "PLAYMATE_RELAY_PATH")]
    pub path: Option<String>,

    /// Also accept the endpoint path with a trailing slash.
    #[arg(long)]
    pub normalize_path: Option<bool>,

    /// Maximum inbound frame size in bytes.
    #[arg(long)]
    pub max_frame_size: Option<usize>,

    /// Seconds between server pings.
    #[arg(long)]
    pub ping_interval_secs: Option<u64>,

    /// Seconds of inbound silence before a connection is dropped.
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "PLAYMATE_RELAY_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:3001`).
    pub bind_addr: String,
    /// Endpoint path for the WebSocket upgrade.
    pub path: String,
    /// Whether `path` with a trailing slash is routed too.
    pub normalize_path: bool,
    /// Maximum allowed inbound frame size in bytes.
    pub max_frame_size: usize,
    /// Interval between server-sent pings.
    pub ping_interval: Duration,
    /// Inbound silence after which a connection is closed.
    pub idle_timeout: Duration,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            path: "/api/socket".to_string(),
            normalize_path: true,
            max_frame_size: 64 * 1024,
            ping_interval: Duration::from_secs(25),
            idle_timeout: Duration::from_secs(60),
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read or
    /// parsed, or if the merged values are invalid.
    pub fn load(cli: &RelayCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        let config = Self::resolve(cli, &file);
        config.validate()?;
        Ok(config)
    }

    /// Resolve a `RelayConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &RelayCliArgs, file: &RelayConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            path: cli
                .path
                .clone()
                .or_else(|| file.server.path.clone())
                .unwrap_or(defaults.path),
            normalize_path: cli
                .normalize_path
                .or(file.server.normalize_path)
                .unwrap_or(defaults.normalize_path),
            max_frame_size: cli
                .max_frame_size
                .or(file.server.max_frame_size)
                .unwrap_or(defaults.max_frame_size),
            ping_interval: cli
                .ping_interval_secs
                .or(file.server.ping_interval_secs)
                .map_or(defaults.ping_interval, Duration::from_secs),
            idle_timeout: cli
                .idle_timeout_secs
                .or(file.server.idle_timeout_secs)
                .map_or(defaults.idle_timeout, Duration::from_secs),
            log_level: cli.log_level.clone(),
        }
    }

    /// Rejects values the server cannot run with.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "path",
                reason: format!("must start with '/', got {:?}", self.path),
            });
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_frame_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.ping_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "ping_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.idle_timeout <= self.ping_interval {
            return Err(ConfigError::Invalid {
                field: "idle_timeout_secs",
                reason: format!(
                    "must exceed the ping interval ({}s)",
                    self.ping_interval.as_secs()
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the relay.
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
        config_dir.join("playmate-relay").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
