//! Secret transport contract and its two wire adapters.
//!
//! `SecretTransport` is the only thing the sync engine knows about the
//! remote side.  `HttpTransport` speaks request/response JSON over HTTP;
//! `RpcTransport` speaks newline-delimited JSON frames over TCP and streams
//! list results.  Both carry the bearer credential on every call and map
//! the remote error body back into `VaultSyncError`.

pub mod context;
pub mod http;
pub mod rpc;
pub mod wire;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::BearerCredential;
use crate::config::settings::Settings;
use crate::crypto::EncryptedEnvelope;
use crate::errors::{Result, VaultSyncError};
use crate::vault::{validate_name, SecretType};

pub use context::{CallContext, CancelHandle};
pub use http::HttpTransport;
pub use rpc::RpcTransport;

/// A stored envelope as returned by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteRecord {
    /// Resolved from the credential at write time; never sent by a client.
    pub secret_owner: String,
    pub secret_name: String,
    pub secret_type: SecretType,
    #[serde(with = "crate::codec::base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "crate::codec::base64_bytes")]
    pub wrapped_key: Vec<u8>,
    /// When the client sealed the envelope.
    pub timestamp: DateTime<Utc>,
    /// When the remote committed it.
    pub updated_at: DateTime<Utc>,
}

impl RemoteRecord {
    pub fn envelope(&self) -> EncryptedEnvelope {
        EncryptedEnvelope {
            secret_name: self.secret_name.clone(),
            secret_type: self.secret_type,
            ciphertext: self.ciphertext.clone(),
            wrapped_key: self.wrapped_key.clone(),
            timestamp: self.timestamp,
        }
    }

    pub fn into_envelope(self) -> EncryptedEnvelope {
        EncryptedEnvelope {
            secret_name: self.secret_name,
            secret_type: self.secret_type,
            ciphertext: self.ciphertext,
            wrapped_key: self.wrapped_key,
            timestamp: self.timestamp,
        }
    }
}

/// Save/Get/List/Delete over one wire protocol.
///
/// Implementations must be observably equivalent: same errors, same
/// overwrite-on-save semantics, same stable list order.
#[async_trait]
pub trait SecretTransport: Send + Sync {
    /// Short protocol label, used in logs.
    fn protocol(&self) -> &'static str;

    /// Store `envelope`, replacing any record with the same type and name.
    async fn save(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        envelope: &EncryptedEnvelope,
    ) -> Result<()>;

    /// Fetch one record; `SecretNotFound` when absent.
    async fn get(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        secret_type: SecretType,
        name: &str,
    ) -> Result<RemoteRecord>;

    /// Every record of a type, ordered by name.  Empty when none exist.
    async fn list(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        secret_type: SecretType,
    ) -> Result<Vec<RemoteRecord>>;

    /// Remove a record.  Deleting an absent name succeeds.
    async fn delete(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        secret_type: SecretType,
        name: &str,
    ) -> Result<()>;
}

/// One transport bound to one secret type.
#[derive(Clone)]
pub struct SecretChannel {
    transport: Arc<dyn SecretTransport>,
    secret_type: SecretType,
}

impl SecretChannel {
    pub fn new(transport: Arc<dyn SecretTransport>, secret_type: SecretType) -> Self {
        Self {
            transport,
            secret_type,
        }
    }

    pub fn secret_type(&self) -> SecretType {
        self.secret_type
    }

    pub fn protocol(&self) -> &'static str {
        self.transport.protocol()
    }

    pub async fn save(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        envelope: &EncryptedEnvelope,
    ) -> Result<()> {
        validate_name(&envelope.secret_name)?;
        if envelope.secret_type != self.secret_type {
            return Err(VaultSyncError::Validation(format!(
                "{} envelope sent on the {} channel",
                envelope.secret_type, self.secret_type
            )));
        }
        self.transport.save(ctx, credential, envelope).await
    }

    pub async fn get(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        name: &str,
    ) -> Result<RemoteRecord> {
        validate_name(name)?;
        self.transport
            .get(ctx, credential, self.secret_type, name)
            .await
    }

    pub async fn list(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
    ) -> Result<Vec<RemoteRecord>> {
        self.transport.list(ctx, credential, self.secret_type).await
    }

    pub async fn delete(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        name: &str,
    ) -> Result<()> {
        validate_name(name)?;
        self.transport
            .delete(ctx, credential, self.secret_type, name)
            .await
    }
}

/// Which wire protocol to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Rpc,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Rpc => f.write_str("rpc"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = VaultSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http" => Ok(Self::Http),
            "rpc" => Ok(Self::Rpc),
            other => Err(VaultSyncError::ConfigError(format!(
                "unknown transport '{other}' (expected http or rpc)"
            ))),
        }
    }
}

/// Build the transport selected by `kind` from client settings.
pub fn connect(kind: TransportKind, settings: &Settings) -> Result<Arc<dyn SecretTransport>> {
    Ok(match kind {
        TransportKind::Http => Arc::new(HttpTransport::new(&settings.server_url)?),
        TransportKind::Rpc => Arc::new(RpcTransport::new(settings.rpc_addr.clone())),
    })
}
