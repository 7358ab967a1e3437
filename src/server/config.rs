//! Server configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultSyncError};
use crate::transport::wire::MAX_FRAME_BYTES;

/// Environment variable that supplies (or overrides) the token secret.
pub const TOKEN_SECRET_ENV: &str = "VAULTSYNC_TOKEN_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub http_addr: String,

    /// Streaming RPC listen address.
    pub rpc_addr: String,

    /// SQLite file holding the envelopes.
    pub database_path: PathBuf,

    /// `iss` claim of issued tokens.
    pub token_issuer: String,

    /// HS256 signing secret.  Prefer the environment variable.
    pub token_secret: Option<String>,

    /// Lifetime of tokens minted by `issue-token`.
    pub token_ttl_secs: u64,

    /// Largest accepted HTTP request body.
    pub max_payload_bytes: usize,

    /// How long an RPC peer may take to send each request frame.
    pub rpc_read_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8700".to_string(),
            rpc_addr: "127.0.0.1:8701".to_string(),
            database_path: PathBuf::from("vaultsync-server.db"),
            token_issuer: "vaultsync".to_string(),
            token_secret: None,
            token_ttl_secs: 30 * 24 * 60 * 60,
            max_payload_bytes: MAX_FRAME_BYTES,
            rpc_read_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| VaultSyncError::ConfigError(format!("{}: {e}", path.display())))
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_payload_bytes: self.max_payload_bytes,
            rpc_read_timeout: Duration::from_secs(self.rpc_read_timeout_secs.max(1)),
        }
    }

    /// The signing secret: environment first, then the config file.
    pub fn token_secret(&self) -> Result<String> {
        std::env::var(TOKEN_SECRET_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.token_secret.clone())
            .ok_or_else(|| {
                VaultSyncError::ConfigError(format!(
                    "no token secret configured (set {TOKEN_SECRET_ENV} or token_secret)"
                ))
            })
    }
}

/// Per-request bounds applied by both listeners.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_payload_bytes: usize,
    pub rpc_read_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        ServerConfig::default().limits()
    }
}
