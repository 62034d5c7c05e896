//! Configuration for the relay server binary.
//!
//! Layered, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env`)
//! 3. TOML file given with `--config`
//! 4. Compiled defaults
//!
//! ```toml
//! [server]
//! bind_addr = "127.0.0.1:9100"
//! idle_timeout_secs = 120
//! call_request_timeout_secs = 0   # never reclaim unanswered calls
//!
//! [[users]]
//! username = "alice"
//! session_id = "dev-alice"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use huddle_signal::CallConfig;

use crate::server::ServerConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct HuddleConfigFile {
    server: ServerFileConfig,
    users: Vec<SeedUser>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    handshake_timeout_secs: Option<u64>,
    idle_timeout_secs: Option<u64>,
    call_request_timeout_secs: Option<u64>,
    log_level: Option<String>,
}

/// A user preloaded into the in-memory store, with a fixed session token.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub session_id: String,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for `huddle-server`.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Huddle chat and signaling relay")]
pub struct HuddleCliArgs {
    /// Address to listen on.
    #[arg(short, long, env = "HUDDLE_ADDR")]
    pub bind: Option<String>,

    /// Path to a TOML config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seconds a new connection has to send its handshake.
    #[arg(long)]
    pub handshake_timeout_secs: Option<u64>,

    /// Close connections silent for this many seconds.
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,

    /// Reclaim unanswered call requests after this many seconds (0 = never).
    #[arg(long)]
    pub call_request_timeout_secs: Option<u64>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "HUDDLE_LOG")]
    pub log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct HuddleConfig {
    pub bind_addr: String,
    pub handshake_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// 0 disables the timeout.
    pub call_request_timeout_secs: u64,
    pub log_level: String,
    pub users: Vec<SeedUser>,
}

impl Default for HuddleConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9100".to_string(),
            handshake_timeout_secs: 5,
            idle_timeout_secs: 60,
            call_request_timeout_secs: 30,
            log_level: "info".to_string(),
            users: Vec::new(),
        }
    }
}

impl HuddleConfig {
    /// Loads configuration from CLI args, env vars, and the `--config`
    /// file if one was given.
    ///
    /// # Errors
    /// [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &HuddleCliArgs) -> Result<Self, ConfigError> {
        let file = match cli.config.as_deref() {
            Some(path) => load_config_file(path)?,
            None => HuddleConfigFile::default(),
        };
        Ok(Self::resolve(cli, file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &HuddleCliArgs, file: HuddleConfigFile) -> Self {
        let defaults = Self::default();
        let server = file.server;

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or(server.bind_addr)
                .unwrap_or(defaults.bind_addr),
            handshake_timeout_secs: cli
                .handshake_timeout_secs
                .or(server.handshake_timeout_secs)
                .unwrap_or(defaults.handshake_timeout_secs),
            idle_timeout_secs: cli
                .idle_timeout_secs
                .or(server.idle_timeout_secs)
                .unwrap_or(defaults.idle_timeout_secs),
            call_request_timeout_secs: cli
                .call_request_timeout_secs
                .or(server.call_request_timeout_secs)
                .unwrap_or(defaults.call_request_timeout_secs),
            log_level: cli
                .log_level
                .clone()
                .or(server.log_level)
                .unwrap_or(defaults.log_level),
            users: file.users,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            ..ServerConfig::default()
        }
    }

    pub fn call_config(&self) -> CallConfig {
        CallConfig {
            request_timeout: match self.call_request_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

fn load_config_file(path: &Path) -> Result<HuddleConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(toml::from_str(&contents)?)
}
