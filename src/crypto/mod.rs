//! Cryptographic primitives for vaultsync.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - The owner's RSA key pair and OAEP key wrapping (`keypair`)
//! - Hybrid envelope sealing and opening (`envelope`)

pub mod encryption;
pub mod envelope;
pub mod keypair;

pub use envelope::{open, open_content, seal, EncryptedEnvelope};
pub use keypair::{OwnerKeyPair, OwnerPrivateKey, OwnerPublicKey};
