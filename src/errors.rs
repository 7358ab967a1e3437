use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vault::SecretType;

/// All errors that can occur in vaultsync.
#[derive(Debug, Error)]
pub enum VaultSyncError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Envelope integrity check failed: {0}")]
    IntegrityFailed(String),

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Key pair not found in {0} (run `vaultsync init` first)")]
    KeysNotFound(PathBuf),

    #[error("Key pair already exists in {0}")]
    KeysAlreadyExist(PathBuf),

    // --- Authentication errors ---
    #[error("invalid or missing authorization")]
    MissingAuthorization,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    // --- Lookup errors ---
    #[error("Secret '{name}' of type {secret_type} not found")]
    SecretNotFound {
        secret_type: SecretType,
        name: String,
    },

    // --- Transport errors ---
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("Remote error: {0}")]
    Remote(String),

    // --- Validation errors ---
    #[error("Invalid request: {0}")]
    Validation(String),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

/// Coarse error taxonomy shared by the engine, both transports and the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    NotFound,
    Integrity,
    Transport,
    Validation,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Authentication => "authentication",
            Self::NotFound => "not found",
            Self::Integrity => "integrity",
            Self::Transport => "transport",
            Self::Validation => "validation",
            Self::Internal => "internal",
        };
        f.write_str(label)
    }
}

impl VaultSyncError {
    /// Classify this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingAuthorization | Self::InvalidCredential(_) => ErrorKind::Authentication,
            Self::SecretNotFound { .. } => ErrorKind::NotFound,
            Self::IntegrityFailed(_) => ErrorKind::Integrity,
            Self::Transport(_) | Self::Cancelled | Self::TimedOut(_) => ErrorKind::Transport,
            Self::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<rusqlite::Error> for VaultSyncError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for VaultSyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// Convenience type alias for vaultsync results.
pub type Result<T> = std::result::Result<T, VaultSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_never_not_found() {
        assert_eq!(
            VaultSyncError::MissingAuthorization.kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            VaultSyncError::InvalidCredential("expired".into()).kind(),
            ErrorKind::Authentication
        );
        assert!(!VaultSyncError::IntegrityFailed("bad tag".into()).is_not_found());
    }

    #[test]
    fn cancellation_is_a_transport_failure() {
        assert_eq!(VaultSyncError::Cancelled.kind(), ErrorKind::Transport);
        assert_eq!(
            VaultSyncError::TimedOut(std::time::Duration::from_secs(1)).kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn missing_authorization_message_is_stable() {
        assert_eq!(
            VaultSyncError::MissingAuthorization.to_string(),
            "invalid or missing authorization"
        );
    }
}
