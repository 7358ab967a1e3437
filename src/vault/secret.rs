//! Secret types held in the local vault.
//!
//! A secret is identified by its type and name.  Its payload shape is
//! fixed by the type; `meta` is a free-form string map.  `SecretContent`
//! (payload + meta) is exactly what gets sealed into an envelope, so the
//! remote side never sees metadata in clear.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultSyncError};

/// Maximum length of a secret name, in characters.
pub const MAX_NAME_LEN: usize = 256;

/// The closed set of secret kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    #[value(alias = "bank_card")]
    BankCard,
    Binary,
    Text,
    #[value(alias = "username_password")]
    UsernamePassword,
}

impl SecretType {
    /// Every secret type, in sync order.
    pub const ALL: [SecretType; 4] = [
        SecretType::BankCard,
        SecretType::Binary,
        SecretType::Text,
        SecretType::UsernamePassword,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BankCard => "bank_card",
            Self::Binary => "binary",
            Self::Text => "text",
            Self::UsernamePassword => "username_password",
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretType {
    type Err = VaultSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bank_card" => Ok(Self::BankCard),
            "binary" => Ok(Self::Binary),
            "text" => Ok(Self::Text),
            "username_password" => Ok(Self::UsernamePassword),
            other => Err(VaultSyncError::Validation(format!(
                "unknown secret type '{other}'"
            ))),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankCard {
    pub number: String,
    pub holder: String,
    /// Expiry as `MM/YY`.
    pub expires: String,
    pub cvv: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryBlob {
    #[serde(with = "crate::codec::base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNote {
    pub content: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Type-specific secret payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "secret_type", rename_all = "snake_case")]
pub enum SecretPayload {
    BankCard(BankCard),
    Binary(BinaryBlob),
    Text(TextNote),
    UsernamePassword(Credentials),
}

// Payloads hold plaintext secrets; keep them out of logs.
impl fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretPayload({})", self.summary())
    }
}

impl SecretPayload {
    pub fn secret_type(&self) -> SecretType {
        match self {
            Self::BankCard(_) => SecretType::BankCard,
            Self::Binary(_) => SecretType::Binary,
            Self::Text(_) => SecretType::Text,
            Self::UsernamePassword(_) => SecretType::UsernamePassword,
        }
    }

    /// Check the required fields of the payload.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::BankCard(card) => {
                let digits = card.number.chars().filter(|c| !c.is_whitespace());
                let count = digits.clone().count();
                if !(12..=19).contains(&count) || !digits.clone().all(|c| c.is_ascii_digit()) {
                    return Err(VaultSyncError::Validation(
                        "card number must be 12-19 digits".into(),
                    ));
                }
                if card.holder.trim().is_empty() {
                    return Err(VaultSyncError::Validation("card holder is required".into()));
                }
                if !is_valid_expiry(&card.expires) {
                    return Err(VaultSyncError::Validation(
                        "card expiry must be MM/YY".into(),
                    ));
                }
                if !(3..=4).contains(&card.cvv.len()) || !card.cvv.chars().all(|c| c.is_ascii_digit())
                {
                    return Err(VaultSyncError::Validation("CVV must be 3-4 digits".into()));
                }
            }
            Self::Binary(blob) => {
                if blob.data.is_empty() {
                    return Err(VaultSyncError::Validation("binary data is empty".into()));
                }
            }
            Self::Text(note) => {
                if note.content.is_empty() {
                    return Err(VaultSyncError::Validation("text content is empty".into()));
                }
            }
            Self::UsernamePassword(creds) => {
                if creds.username.is_empty() {
                    return Err(VaultSyncError::Validation("username is required".into()));
                }
                if creds.password.is_empty() {
                    return Err(VaultSyncError::Validation("password is required".into()));
                }
            }
        }
        Ok(())
    }

    /// Short description with sensitive parts masked.
    ///
    /// Used when showing two versions side by side during a conflict.
    pub fn summary(&self) -> String {
        match self {
            Self::BankCard(card) => {
                let digits: String = card.number.chars().filter(|c| c.is_ascii_digit()).collect();
                let last4 = &digits[digits.len().saturating_sub(4)..];
                format!("card ****{last4}, {}, exp {}", card.holder, card.expires)
            }
            Self::Binary(blob) => format!("{} bytes", blob.data.len()),
            Self::Text(note) => {
                let preview: String = note.content.chars().take(24).collect();
                if note.content.chars().count() > 24 {
                    format!("\"{preview}...\" ({} chars)", note.content.chars().count())
                } else {
                    format!("\"{preview}\"")
                }
            }
            Self::UsernamePassword(creds) => format!("user {}", creds.username),
        }
    }
}

fn is_valid_expiry(expires: &str) -> bool {
    let Some((month, year)) = expires.split_once('/') else {
        return false;
    };
    month.len() == 2
        && year.len() == 2
        && year.chars().all(|c| c.is_ascii_digit())
        && matches!(month.parse::<u8>(), Ok(1..=12))
}

/// Plaintext sealed inside an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretContent {
    pub payload: SecretPayload,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// A plaintext secret as held in the local vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    pub payload: SecretPayload,
    pub meta: BTreeMap<String, String>,
    /// Logical last-write time.
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    pub fn new(name: impl Into<String>, payload: SecretPayload) -> Self {
        Self {
            name: name.into(),
            payload,
            meta: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_meta(mut self, meta: BTreeMap<String, String>) -> Self {
        self.meta = meta;
        self
    }

    pub fn secret_type(&self) -> SecretType {
        self.payload.secret_type()
    }

    /// The part of the secret that gets sealed.
    pub fn content(&self) -> SecretContent {
        SecretContent {
            payload: self.payload.clone(),
            meta: self.meta.clone(),
        }
    }

    /// Rebuild a secret from opened envelope content.
    pub fn from_content(
        name: impl Into<String>,
        content: SecretContent,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            payload: content.payload,
            meta: content.meta,
            updated_at,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        self.payload.validate()
    }
}

/// Lightweight listing row (no payload).
#[derive(Debug, Clone)]
pub struct SecretMetadata {
    pub name: String,
    pub secret_type: SecretType,
    pub updated_at: DateTime<Utc>,
}

/// Check that a secret name is usable on every transport.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(VaultSyncError::Validation("secret name is empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(VaultSyncError::Validation(format!(
            "secret name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(VaultSyncError::Validation(
            "secret name contains control characters".into(),
        ));
    }
    // URL path resolution would collapse these into the parent route.
    if name == "." || name == ".." {
        return Err(VaultSyncError::Validation(format!(
            "'{name}' is not a usable secret name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str, expires: &str, cvv: &str) -> SecretPayload {
        SecretPayload::BankCard(BankCard {
            number: number.into(),
            holder: "J DOE".into(),
            expires: expires.into(),
            cvv: cvv.into(),
        })
    }

    #[test]
    fn secret_type_parses_wire_names() {
        for t in SecretType::ALL {
            assert_eq!(t.as_str().parse::<SecretType>().unwrap(), t);
        }
        assert!("card".parse::<SecretType>().is_err());
    }

    #[test]
    fn payload_is_tagged_by_secret_type() {
        let json = serde_json::to_value(SecretPayload::Text(TextNote {
            content: "hi".into(),
        }))
        .unwrap();
        assert_eq!(json["secret_type"], "text");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn bank_card_validation() {
        assert!(card("4111 1111 1111 1111", "09/27", "123").validate().is_ok());
        assert!(card("4111", "09/27", "123").validate().is_err());
        assert!(card("4111111111111111", "13/27", "123").validate().is_err());
        assert!(card("4111111111111111", "0927", "123").validate().is_err());
        assert!(card("4111111111111111", "09/27", "12a").validate().is_err());
    }

    #[test]
    fn empty_payloads_are_rejected() {
        assert!(SecretPayload::Binary(BinaryBlob { data: vec![] })
            .validate()
            .is_err());
        assert!(SecretPayload::UsernamePassword(Credentials {
            username: "u".into(),
            password: String::new(),
        })
        .validate()
        .is_err());
    }

    #[test]
    fn summary_masks_card_number() {
        let summary = card("4111111111111234", "09/27", "123").summary();
        assert!(summary.contains("****1234"));
        assert!(!summary.contains("4111"));
    }

    #[test]
    fn debug_output_hides_password() {
        let payload = SecretPayload::UsernamePassword(Credentials {
            username: "alice".into(),
            password: "hunter2".into(),
        });
        assert!(!format!("{payload:?}").contains("hunter2"));
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("note1").is_ok());
        assert!(validate_name("work/email account").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("bad\nname").is_err());
        assert!(validate_name(&"a".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("...").is_ok());
        assert!(validate_name(".env").is_ok());
    }
}
