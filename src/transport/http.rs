//! Request/response adapter over HTTP.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use tracing::debug;

use super::context::CallContext;
use super::wire::{DeleteRequest, ErrorBody};
use super::{RemoteRecord, SecretTransport};
use crate::auth::BearerCredential;
use crate::crypto::EncryptedEnvelope;
use crate::errors::{Result, VaultSyncError};
use crate::vault::{validate_name, SecretType};

pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| VaultSyncError::ConfigError(format!("bad server url '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(VaultSyncError::ConfigError(format!(
                "server url '{base_url}' cannot be a base"
            )));
        }
        let client = Client::builder()
            .user_agent(concat!("vaultsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VaultSyncError::Transport(e.to_string()))?;
        Ok(Self { client, base })
    }

    /// `GET /health`.
    pub async fn health(&self, ctx: &CallContext) -> Result<()> {
        let url = self.url(&["health"])?;
        ctx.run(async {
            let response = self.client.get(url).send().await.map_err(transport_error)?;
            check(response, None).await.map(drop)
        })
        .await
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| VaultSyncError::ConfigError("server url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn secrets_url(&self, secret_type: SecretType, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["api", "v1", "secrets", secret_type.as_str()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }
}

fn transport_error(e: reqwest::Error) -> VaultSyncError {
    VaultSyncError::Transport(e.to_string())
}

/// Pass through a success response; turn anything else into an error.
async fn check(response: Response, target: Option<(SecretType, &str)>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.map_err(transport_error)?;
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => Err(body.into_error(target)),
        Err(_) => match (status, target) {
            (StatusCode::NOT_FOUND, Some((secret_type, name))) => {
                Err(VaultSyncError::SecretNotFound {
                    secret_type,
                    name: name.to_string(),
                })
            }
            _ => Err(VaultSyncError::Transport(format!(
                "unexpected HTTP {status} from server"
            ))),
        },
    }
}

#[async_trait]
impl SecretTransport for HttpTransport {
    fn protocol(&self) -> &'static str {
        "http"
    }

    async fn save(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        envelope: &EncryptedEnvelope,
    ) -> Result<()> {
        let url = self.secrets_url(envelope.secret_type, &[])?;
        debug!(secret_type = %envelope.secret_type, name = %envelope.secret_name, "http save");
        ctx.run(async {
            let response = self
                .client
                .post(url)
                .header(reqwest::header::AUTHORIZATION, credential.header_value())
                .json(envelope)
                .send()
                .await
                .map_err(transport_error)?;
            check(response, None).await.map(drop)
        })
        .await
    }

    async fn get(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        secret_type: SecretType,
        name: &str,
    ) -> Result<RemoteRecord> {
        validate_name(name)?;
        let url = self.secrets_url(secret_type, &[name])?;
        ctx.run(async {
            let response = self
                .client
                .get(url)
                .header(reqwest::header::AUTHORIZATION, credential.header_value())
                .send()
                .await
                .map_err(transport_error)?;
            let response = check(response, Some((secret_type, name))).await?;
            response.json::<RemoteRecord>().await.map_err(transport_error)
        })
        .await
    }

    async fn list(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        secret_type: SecretType,
    ) -> Result<Vec<RemoteRecord>> {
        let url = self.secrets_url(secret_type, &[])?;
        ctx.run(async {
            let response = self
                .client
                .get(url)
                .header(reqwest::header::AUTHORIZATION, credential.header_value())
                .send()
                .await
                .map_err(transport_error)?;
            let response = check(response, None).await?;
            response
                .json::<Vec<RemoteRecord>>()
                .await
                .map_err(transport_error)
        })
        .await
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        secret_type: SecretType,
        name: &str,
    ) -> Result<()> {
        let url = self.secrets_url(secret_type, &["delete"])?;
        let body = DeleteRequest {
            secret_name: name.to_string(),
        };
        ctx.run(async {
            let response = self
                .client
                .post(url)
                .header(reqwest::header::AUTHORIZATION, credential.header_value())
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            check(response, None).await.map(drop)
        })
        .await
    }
}
