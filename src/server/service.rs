//! The operation set both protocols expose.
//!
//! Handlers resolve the owner through `resolve` before reading a request
//! body; every other method takes the resolved `OwnerId` and never an
//! owner supplied by the client.

use std::sync::Arc;

use tracing::debug;

use super::store::EnvelopeStore;
use crate::auth::{BearerCredential, OwnerId, OwnerResolver};
use crate::crypto::EncryptedEnvelope;
use crate::errors::{Result, VaultSyncError};
use crate::transport::RemoteRecord;
use crate::vault::{validate_name, SecretType};

pub struct SecretService {
    resolver: Arc<dyn OwnerResolver>,
    store: EnvelopeStore,
}

impl SecretService {
    pub fn new(resolver: Arc<dyn OwnerResolver>, store: EnvelopeStore) -> Self {
        Self { resolver, store }
    }

    pub fn resolve(&self, credential: &BearerCredential) -> Result<OwnerId> {
        self.resolver.resolve(credential)
    }

    /// Store an envelope received on the `secret_type` route.
    pub fn save(
        &self,
        owner: &OwnerId,
        secret_type: SecretType,
        envelope: &EncryptedEnvelope,
    ) -> Result<RemoteRecord> {
        validate_name(&envelope.secret_name)?;
        if envelope.secret_type != secret_type {
            return Err(VaultSyncError::Validation(format!(
                "envelope type {} does not match route type {secret_type}",
                envelope.secret_type
            )));
        }
        if envelope.ciphertext.is_empty() {
            return Err(VaultSyncError::Validation("ciphertext is empty".into()));
        }
        if envelope.wrapped_key.is_empty() {
            return Err(VaultSyncError::Validation("wrapped_key is empty".into()));
        }

        let record = self.store.save(owner, envelope)?;
        debug!(%owner, %secret_type, name = %envelope.secret_name, "envelope saved");
        Ok(record)
    }

    pub fn get(&self, owner: &OwnerId, secret_type: SecretType, name: &str) -> Result<RemoteRecord> {
        validate_name(name)?;
        self.store
            .get(owner, secret_type, name)?
            .ok_or_else(|| VaultSyncError::SecretNotFound {
                secret_type,
                name: name.to_string(),
            })
    }

    pub fn list(&self, owner: &OwnerId, secret_type: SecretType) -> Result<Vec<RemoteRecord>> {
        self.store.list(owner, secret_type)
    }

    /// Idempotent.
    pub fn delete(&self, owner: &OwnerId, secret_type: SecretType, name: &str) -> Result<()> {
        validate_name(name)?;
        if self.store.delete(owner, secret_type, name)? {
            debug!(%owner, %secret_type, name, "envelope deleted");
        }
        Ok(())
    }
}
