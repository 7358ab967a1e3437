//! Hybrid envelope encryption.
//!
//! `seal` serializes a payload, encrypts it under a fresh AES-256-GCM key
//! and wraps that key with the owner's RSA public key.  `open` reverses
//! it.  The secret's type and name are bound in as associated data, so an
//! envelope replayed under another name fails to open.
//!
//! Only envelopes ever leave the client; the remote side stores them
//! verbatim and cannot open them.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::encryption::{self, KEY_LEN, NONCE_LEN, TAG_LEN};
use super::keypair::{OwnerPrivateKey, OwnerPublicKey};
use crate::errors::{Result, VaultSyncError};
use crate::vault::{SecretContent, SecretType};

/// The only representation of secret content a remote party ever sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptedEnvelope {
    pub secret_name: String,
    pub secret_type: SecretType,
    /// `nonce(12) || ciphertext || tag(16)`.
    #[serde(with = "crate::codec::base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Per-envelope AES key, RSA-OAEP encrypted under the owner key.
    #[serde(with = "crate::codec::base64_bytes")]
    pub wrapped_key: Vec<u8>,
    /// When the envelope was sealed.
    pub timestamp: DateTime<Utc>,
}

fn associated_data(secret_type: SecretType, secret_name: &str) -> Vec<u8> {
    format!("vaultsync/v1/{secret_type}/{secret_name}").into_bytes()
}

/// Seal `payload` for the holder of the private half of `public`.
pub fn seal<T: Serialize>(
    public: &OwnerPublicKey,
    secret_name: &str,
    secret_type: SecretType,
    payload: &T,
) -> Result<EncryptedEnvelope> {
    let mut plaintext = serde_json::to_vec(payload)?;
    let mut key = encryption::generate_key();

    let sealed = encryption::encrypt(
        &key,
        &plaintext,
        &associated_data(secret_type, secret_name),
    )
    .and_then(|ciphertext| Ok((ciphertext, public.wrap(&key)?)));

    key.as_mut_slice().zeroize();
    plaintext.zeroize();
    let (ciphertext, wrapped_key) = sealed?;

    Ok(EncryptedEnvelope {
        secret_name: secret_name.to_string(),
        secret_type,
        ciphertext,
        wrapped_key,
        timestamp: Utc::now(),
    })
}

/// Open an envelope sealed for `private`'s public half.
///
/// Field lengths are checked before any cryptographic operation; every
/// failure is an `IntegrityFailed` error.
pub fn open<T: DeserializeOwned>(private: &OwnerPrivateKey, envelope: &EncryptedEnvelope) -> Result<T> {
    if envelope.wrapped_key.len() != private.wrapped_len() {
        return Err(VaultSyncError::IntegrityFailed(format!(
            "wrapped key is {} bytes, expected {}",
            envelope.wrapped_key.len(),
            private.wrapped_len()
        )));
    }
    if envelope.ciphertext.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultSyncError::IntegrityFailed(format!(
            "ciphertext is {} bytes, expected at least {}",
            envelope.ciphertext.len(),
            NONCE_LEN + TAG_LEN
        )));
    }

    let mut key = private.unwrap_key(&envelope.wrapped_key)?;
    if key.len() != KEY_LEN {
        key.zeroize();
        return Err(VaultSyncError::IntegrityFailed(
            "unwrapped key has the wrong length".into(),
        ));
    }

    let decrypted = encryption::decrypt(
        &key,
        &envelope.ciphertext,
        &associated_data(envelope.secret_type, &envelope.secret_name),
    );
    key.zeroize();
    let mut plaintext = decrypted?;

    let parsed = serde_json::from_slice(&plaintext).map_err(|e| {
        VaultSyncError::IntegrityFailed(format!("authenticated payload does not decode: {e}"))
    });
    plaintext.zeroize();
    parsed
}

/// Open an envelope holding a `SecretContent` and check that the payload
/// type agrees with the envelope's declared type.
pub fn open_content(private: &OwnerPrivateKey, envelope: &EncryptedEnvelope) -> Result<SecretContent> {
    let content: SecretContent = open(private, envelope)?;
    if content.payload.secret_type() != envelope.secret_type {
        return Err(VaultSyncError::IntegrityFailed(format!(
            "envelope declares {} but carries {}",
            envelope.secret_type,
            content.payload.secret_type()
        )));
    }
    Ok(content)
}
