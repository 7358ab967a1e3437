use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::BearerCredential;
use crate::crypto::keypair::DEFAULT_KEY_BITS;
use crate::errors::{Result, VaultSyncError};
use crate::sync::ResolutionPolicy;
use crate::transport::TransportKind;

/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "VAULTSYNC_TOKEN";

/// File inside the data directory holding the bearer token.
pub const CREDENTIAL_FILE: &str = "credential";

/// Client configuration, loaded from `<data_dir>/vaultsync.toml`.
///
/// Every field has a sensible default so vaultsync works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the HTTP endpoint.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// `host:port` of the streaming RPC endpoint.
    #[serde(default = "default_rpc_addr")]
    pub rpc_addr: String,

    /// Transport used when `--transport` is not given.
    #[serde(default = "default_transport")]
    pub transport: TransportKind,

    /// Policy used when `--policy` is not given.
    #[serde(default = "default_policy")]
    pub policy: ResolutionPolicy,

    /// Per-call timeout for remote operations.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// RSA modulus size used by `init`.
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_server_url() -> String {
    "http://127.0.0.1:8700".to_string()
}

fn default_rpc_addr() -> String {
    "127.0.0.1:8701".to_string()
}

fn default_transport() -> TransportKind {
    TransportKind::Http
}

fn default_policy() -> ResolutionPolicy {
    ResolutionPolicy::TakeLocal
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_key_bits() -> usize {
    DEFAULT_KEY_BITS
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            rpc_addr: default_rpc_addr(),
            transport: default_transport(),
            policy: default_policy(),
            request_timeout_secs: default_request_timeout_secs(),
            key_bits: default_key_bits(),
        }
    }
}

impl Settings {
    /// Name of the config file inside the data directory.
    pub const FILE_NAME: &'static str = "vaultsync.toml";

    /// Load settings from `<data_dir>/vaultsync.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultSyncError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Write these settings to `<data_dir>/vaultsync.toml`.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| VaultSyncError::SerializationError(e.to_string()))?;
        std::fs::write(data_dir.join(Self::FILE_NAME), contents)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The bearer credential: `VAULTSYNC_TOKEN` if set, else `<data_dir>/credential`.
pub fn load_credential(data_dir: &Path) -> Result<BearerCredential> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            return BearerCredential::new(token);
        }
    }

    let path = data_dir.join(CREDENTIAL_FILE);
    if !path.exists() {
        return Err(VaultSyncError::ConfigError(format!(
            "no credential found: set {TOKEN_ENV} or write a token to {}",
            path.display()
        )));
    }
    BearerCredential::new(std::fs::read_to_string(&path)?)
}

// ── Tests ────────────────────────────────────────────────────────────
