//! Axum router for the HTTP protocol.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::de::DeserializeOwned;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::service::SecretService;
use crate::auth::{BearerCredential, OwnerId};
use crate::crypto::EncryptedEnvelope;
use crate::errors::VaultSyncError;
use crate::transport::wire::DeleteRequest;
use crate::transport::RemoteRecord;
use crate::vault::SecretType;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SecretService>,
}

pub fn build_router(state: AppState, max_payload_bytes: usize) -> Router {
    let secrets = Router::new()
        .route(
            "/api/v1/secrets/{secret_type}",
            post(save_secret).get(list_secrets),
        )
        // A secret literally named "delete" is still reachable with GET.
        .route(
            "/api/v1/secrets/{secret_type}/delete",
            post(delete_secret).get(get_secret_named_delete),
        )
        .route("/api/v1/secrets/{secret_type}/{secret_name}", get(get_secret))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_owner));

    Router::new()
        .merge(secrets)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_payload_bytes))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Resolve the owner from the `Authorization` header before any body is read.
async fn require_owner(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let credential = BearerCredential::from_authorization_header(header)?;
    let owner = state.service.resolve(&credential)?;

    request.extensions_mut().insert(owner);
    Ok(next.run(request).await)
}

fn parse_type(raw: &str) -> Result<SecretType, ApiError> {
    Ok(raw.parse::<SecretType>()?)
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError(VaultSyncError::Validation(format!("malformed body: {e}"))))
}

async fn save_secret(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(secret_type): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let secret_type = parse_type(&secret_type)?;
    let envelope: EncryptedEnvelope = parse_body(&body)?;
    state.service.save(&owner, secret_type, &envelope)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_secret(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path((secret_type, secret_name)): Path<(String, String)>,
) -> Result<Json<RemoteRecord>, ApiError> {
    let secret_type = parse_type(&secret_type)?;
    Ok(Json(state.service.get(&owner, secret_type, &secret_name)?))
}

async fn get_secret_named_delete(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(secret_type): Path<String>,
) -> Result<Json<RemoteRecord>, ApiError> {
    let secret_type = parse_type(&secret_type)?;
    Ok(Json(state.service.get(&owner, secret_type, "delete")?))
}

async fn list_secrets(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(secret_type): Path<String>,
) -> Result<Json<Vec<RemoteRecord>>, ApiError> {
    let secret_type = parse_type(&secret_type)?;
    Ok(Json(state.service.list(&owner, secret_type)?))
}

async fn delete_secret(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(secret_type): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let secret_type = parse_type(&secret_type)?;
    let request: DeleteRequest = parse_body(&body)?;
    state
        .service
        .delete(&owner, secret_type, &request.secret_name)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
