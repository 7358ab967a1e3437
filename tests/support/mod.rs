//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use chrono::Utc;

use vaultsync::auth::BearerCredential;
use vaultsync::crypto::{EncryptedEnvelope, OwnerKeyPair};
use vaultsync::errors::{Result, VaultSyncError};
use vaultsync::transport::{CallContext, CancelHandle, RemoteRecord, SecretTransport};
use vaultsync::vault::{Credentials, Secret, SecretPayload, SecretType, TextNote};

/// One 2048-bit key pair per test binary; generation is slow.
pub fn keys() -> &'static OwnerKeyPair {
    static KEYS: OnceLock<OwnerKeyPair> = OnceLock::new();
    KEYS.get_or_init(|| OwnerKeyPair::generate(2048).expect("generate key pair"))
}

pub fn credential() -> BearerCredential {
    BearerCredential::new("test-token").expect("credential")
}

pub fn text(name: &str, content: &str) -> Secret {
    Secret::new(
        name,
        SecretPayload::Text(TextNote {
            content: content.to_string(),
        }),
    )
}

pub fn login(name: &str, username: &str, password: &str) -> Secret {
    Secret::new(
        name,
        SecretPayload::UsernamePassword(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }),
    )
}

/// In-memory remote that records every save and can be told to fail.
#[derive(Default)]
pub struct RecordingTransport {
    records: Mutex<BTreeMap<(SecretType, String), RemoteRecord>>,
    saves: Mutex<Vec<(SecretType, String)>>,
    failing: Mutex<HashSet<String>>,
    failing_saves: Mutex<HashSet<String>>,
    cancel_after: Mutex<Option<(usize, CancelHandle)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an envelope on the remote without going through the engine.
    pub fn seed(&self, envelope: &EncryptedEnvelope) {
        let record = to_record(envelope);
        self.records
            .lock()
            .unwrap()
            .insert((record.secret_type, record.secret_name.clone()), record);
    }

    /// Any call touching `name` fails with a transport error.
    pub fn fail_on(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// Only saves of `name` fail; reads still succeed.
    pub fn fail_saves_on(&self, name: &str) {
        self.failing_saves.lock().unwrap().insert(name.to_string());
    }

    /// Fire `handle` once `saves` saves have completed.
    pub fn cancel_after(&self, saves: usize, handle: CancelHandle) {
        *self.cancel_after.lock().unwrap() = Some((saves, handle));
    }

    pub fn saves(&self) -> Vec<(SecretType, String)> {
        self.saves.lock().unwrap().clone()
    }

    pub fn record(&self, secret_type: SecretType, name: &str) -> Option<RemoteRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(secret_type, name.to_string()))
            .cloned()
    }

    pub fn names(&self, secret_type: SecretType) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .keys()
            .filter(|(t, _)| *t == secret_type)
            .map(|(_, n)| n.clone())
            .collect()
    }

    fn check(&self, ctx: &CallContext, name: &str) -> Result<()> {
        ctx.check()?;
        if self.failing.lock().unwrap().contains(name) {
            return Err(VaultSyncError::Transport(format!(
                "injected failure for {name}"
            )));
        }
        Ok(())
    }
}

fn to_record(envelope: &EncryptedEnvelope) -> RemoteRecord {
    RemoteRecord {
        secret_owner: "owner-1".to_string(),
        secret_name: envelope.secret_name.clone(),
        secret_type: envelope.secret_type,
        ciphertext: envelope.ciphertext.clone(),
        wrapped_key: envelope.wrapped_key.clone(),
        timestamp: envelope.timestamp,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl SecretTransport for RecordingTransport {
    fn protocol(&self) -> &'static str {
        "memory"
    }

    async fn save(
        &self,
        ctx: &CallContext,
        _credential: &BearerCredential,
        envelope: &EncryptedEnvelope,
    ) -> Result<()> {
        self.check(ctx, &envelope.secret_name)?;
        if self.failing_saves.lock().unwrap().contains(&envelope.secret_name) {
            return Err(VaultSyncError::Transport(format!(
                "injected save failure for {}",
                envelope.secret_name
            )));
        }
        self.seed(envelope);

        let count = {
            let mut saves = self.saves.lock().unwrap();
            saves.push((envelope.secret_type, envelope.secret_name.clone()));
            saves.len()
        };
        if let Some((after, handle)) = self.cancel_after.lock().unwrap().as_ref() {
            if count >= *after {
                handle.cancel();
            }
        }
        Ok(())
    }

    async fn get(
        &self,
        ctx: &CallContext,
        _credential: &BearerCredential,
        secret_type: SecretType,
        name: &str,
    ) -> Result<RemoteRecord> {
        self.check(ctx, name)?;
        self.record(secret_type, name)
            .ok_or_else(|| VaultSyncError::SecretNotFound {
                secret_type,
                name: name.to_string(),
            })
    }

    async fn list(
        &self,
        ctx: &CallContext,
        _credential: &BearerCredential,
        secret_type: SecretType,
    ) -> Result<Vec<RemoteRecord>> {
        ctx.check()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.secret_type == secret_type)
            .cloned()
            .collect())
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        _credential: &BearerCredential,
        secret_type: SecretType,
        name: &str,
    ) -> Result<()> {
        self.check(ctx, name)?;
        self.records
            .lock()
            .unwrap()
            .remove(&(secret_type, name.to_string()));
        Ok(())
    }
}
