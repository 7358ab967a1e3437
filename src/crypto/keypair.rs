//! Owner key pair: RSA keys used to wrap per-envelope symmetric keys.
//!
//! The private key never leaves the client.  It is stored as PKCS#8 PEM
//! with owner-only permissions; the public key sits next to it as SPKI
//! PEM.  Key wrapping uses RSA-OAEP with SHA-256.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::errors::{Result, VaultSyncError};

/// Smallest modulus we accept when generating or loading keys.
pub const MIN_KEY_BITS: usize = 2048;

/// Default modulus size for newly generated keys.
pub const DEFAULT_KEY_BITS: usize = 3072;

const PRIVATE_KEY_FILE: &str = "owner_key.pem";
const PUBLIC_KEY_FILE: &str = "owner_key.pub.pem";

/// Public half: anyone holding it can seal envelopes for the owner.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerPublicKey(RsaPublicKey);

/// Private half: required to open envelopes.
#[derive(Clone)]
pub struct OwnerPrivateKey(RsaPrivateKey);

impl std::fmt::Debug for OwnerPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerPrivateKey")
            .field("bits", &(self.0.size() * 8))
            .finish_non_exhaustive()
    }
}

impl OwnerPublicKey {
    /// Encrypt a symmetric key under this public key.
    pub fn wrap(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.0
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key)
            .map_err(|e| VaultSyncError::EncryptionFailed(format!("key wrap failed: {e}")))
    }

    /// Length in bytes of every key wrapped under this key.
    pub fn wrapped_len(&self) -> usize {
        self.0.size()
    }

    pub fn to_pem(&self) -> Result<String> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| VaultSyncError::KeyError(format!("public key encoding: {e}")))
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| VaultSyncError::KeyError(format!("public key decoding: {e}")))?;
        Ok(Self(key))
    }
}

impl OwnerPrivateKey {
    /// Recover a symmetric key wrapped by the matching public key.
    ///
    /// The wrapped length is checked before the RSA operation runs.
    pub fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>> {
        if wrapped.len() != self.wrapped_len() {
            return Err(VaultSyncError::IntegrityFailed(format!(
                "wrapped key is {} bytes, expected {}",
                wrapped.len(),
                self.wrapped_len()
            )));
        }

        self.0
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| VaultSyncError::IntegrityFailed("key unwrap failed".into()))
    }

    pub fn wrapped_len(&self) -> usize {
        self.0.size()
    }

    pub fn public_key(&self) -> OwnerPublicKey {
        OwnerPublicKey(RsaPublicKey::from(&self.0))
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| VaultSyncError::KeyError(format!("private key decoding: {e}")))?;
        if key.size() * 8 < MIN_KEY_BITS {
            return Err(VaultSyncError::KeyError(format!(
                "private key is {} bits, minimum is {MIN_KEY_BITS}",
                key.size() * 8
            )));
        }
        Ok(Self(key))
    }
}

/// Both halves of an owner's key pair.
#[derive(Debug, Clone)]
pub struct OwnerKeyPair {
    pub public: OwnerPublicKey,
    pub private: OwnerPrivateKey,
}

impl OwnerKeyPair {
    /// Generate a new key pair with a modulus of `bits` bits.
    pub fn generate(bits: usize) -> Result<Self> {
        if bits < MIN_KEY_BITS {
            return Err(VaultSyncError::KeyError(format!(
                "key size must be at least {MIN_KEY_BITS} bits (got {bits})"
            )));
        }

        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| VaultSyncError::KeyError(format!("key generation failed: {e}")))?;
        let private = OwnerPrivateKey(private);

        Ok(Self {
            public: private.public_key(),
            private,
        })
    }

    /// Write both key files into `dir`, refusing to overwrite an existing pair.
    ///
    /// The private key file is created with owner-only permissions.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let (private_path, public_path) = key_paths(dir);
        if private_path.exists() {
            return Err(VaultSyncError::KeysAlreadyExist(dir.to_path_buf()));
        }

        fs::create_dir_all(dir).map_err(|e| {
            VaultSyncError::KeyError(format!("cannot create key directory: {e}"))
        })?;

        let private_pem = self
            .private
            .0
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| VaultSyncError::KeyError(format!("private key encoding: {e}")))?;

        write_private(&private_path, private_pem.as_bytes())?;
        fs::write(&public_path, self.public.to_pem()?)
            .map_err(|e| VaultSyncError::KeyError(format!("failed to write public key: {e}")))?;

        Ok(())
    }

    /// Load the key pair previously written by `save`.
    pub fn load(dir: &Path) -> Result<Self> {
        let (private_path, _) = key_paths(dir);
        if !private_path.exists() {
            return Err(VaultSyncError::KeysNotFound(dir.to_path_buf()));
        }

        let pem = zeroize::Zeroizing::new(
            fs::read_to_string(&private_path)
                .map_err(|e| VaultSyncError::KeyError(format!("failed to read private key: {e}")))?,
        );
        let private = OwnerPrivateKey::from_pem(&pem)?;

        Ok(Self {
            public: private.public_key(),
            private,
        })
    }

    pub fn exists(dir: &Path) -> bool {
        key_paths(dir).0.exists()
    }
}

fn key_paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join(PRIVATE_KEY_FILE), dir.join(PUBLIC_KEY_FILE))
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| VaultSyncError::KeyError(format!("failed to create private key: {e}")))?;
        file.write_all(contents)
            .map_err(|e| VaultSyncError::KeyError(format!("failed to write private key: {e}")))?;
    }

    #[cfg(not(unix))]
    fs::write(path, contents)
        .map_err(|e| VaultSyncError::KeyError(format!("failed to write private key: {e}")))?;

    Ok(())
}
