//! Ownership resolution.
//!
//! Every remote call carries a `BearerCredential`; the server turns it into
//! the `OwnerId` that scopes all storage.  Callers never pass an owner
//! explicitly.  The bundled resolver is `TokenAuthority`, which issues and
//! verifies HS256 JWTs.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::{Result, VaultSyncError};

/// Opaque bearer token presented by a client.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredential(String);

impl BearerCredential {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(VaultSyncError::MissingAuthorization);
        }
        Ok(Self(token))
    }

    /// Parse an `Authorization` header value of the form `Bearer <token>`.
    pub fn from_authorization_header(value: Option<&str>) -> Result<Self> {
        let token = value
            .and_then(extract_bearer_token)
            .ok_or(VaultSyncError::MissingAuthorization)?;
        Self::new(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `Authorization` header value for this credential.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerCredential(***)")
    }
}

fn extract_bearer_token(value: &str) -> Option<&str> {
    let value = value.trim();
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
}

/// The authenticated principal that owns a set of secrets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(VaultSyncError::Validation("owner id is empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps a credential to its owner.
pub trait OwnerResolver: Send + Sync {
    /// Fails with an authentication error for an invalid or expired credential.
    fn resolve(&self, credential: &BearerCredential) -> Result<OwnerId>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies HS256 bearer tokens.
pub struct TokenAuthority {
    secret: Zeroizing<Vec<u8>>,
    issuer: String,
}

impl TokenAuthority {
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.len() < 16 {
            return Err(VaultSyncError::ConfigError(
                "token secret must be at least 16 bytes".into(),
            ));
        }
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            issuer: issuer.into(),
        })
    }

    /// Mint a token for `owner` valid for `ttl`.
    pub fn issue(&self, owner: &OwnerId, ttl: Duration) -> Result<BearerCredential> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs())
            .map_err(|_| VaultSyncError::Validation("token lifetime too large".into()))?;
        let claims = Claims {
            sub: owner.as_str().to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now.saturating_add(ttl),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| VaultSyncError::KeyError(format!("failed to sign token: {e}")))?;

        BearerCredential::new(token)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation
    }
}

impl OwnerResolver for TokenAuthority {
    fn resolve(&self, credential: &BearerCredential) -> Result<OwnerId> {
        let data = decode::<Claims>(
            credential.as_str(),
            &DecodingKey::from_secret(&self.secret),
            &self.validation(),
        )
        .map_err(|e| VaultSyncError::InvalidCredential(e.to_string()))?;

        OwnerId::new(data.claims.sub)
            .map_err(|_| VaultSyncError::InvalidCredential("empty subject".into()))
    }
}
