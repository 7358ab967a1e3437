//! Vault module — the local, plaintext-side secret store.
//!
//! This module provides:
//! - Secret types, payloads and validation (`secret`)
//! - The SQLite-backed `SecretStore` and the `LocalCache` seam used by sync (`store`)

pub mod secret;
pub mod store;

pub use secret::{
    validate_name, BankCard, BinaryBlob, Credentials, Secret, SecretContent, SecretMetadata,
    SecretPayload, SecretType, TextNote,
};
pub use store::{LocalCache, SecretStore};
