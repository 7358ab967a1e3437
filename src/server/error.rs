//! HTTP mapping of service errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::errors::VaultSyncError;
use crate::transport::wire::{ErrorBody, ErrorCode};

/// A service error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub VaultSyncError);

impl From<VaultSyncError> for ApiError {
    fn from(e: VaultSyncError) -> Self {
        Self(e)
    }
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::MissingAuthorization | ErrorCode::InvalidCredential => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody::from_error(&self.0);
        if body.error == ErrorCode::Internal {
            error!(error = %self.0, "request failed");
        }
        (status_for(body.error), Json(body)).into_response()
    }
}
