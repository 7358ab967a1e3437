//! Wire shapes shared by the client adapters and the server.
//!
//! Error bodies are the same on both protocols.  The RPC protocol is one
//! JSON value per line: the client sends a metadata frame, then a call
//! frame; the server answers with reply frames.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::RemoteRecord;
use crate::crypto::EncryptedEnvelope;
use crate::errors::{Result, VaultSyncError};
use crate::vault::SecretType;

/// Largest accepted request body or RPC frame.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MissingAuthorization,
    InvalidCredential,
    NotFound,
    Validation,
    Internal,
}

/// `{ "error": code, "message": text }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    /// The wire form of a server-side error.  Internal details are not sent.
    pub fn from_error(err: &VaultSyncError) -> Self {
        let (error, message) = match err {
            VaultSyncError::MissingAuthorization => {
                (ErrorCode::MissingAuthorization, err.to_string())
            }
            VaultSyncError::InvalidCredential(_) => {
                (ErrorCode::InvalidCredential, "invalid credential".to_string())
            }
            VaultSyncError::SecretNotFound { .. } => (ErrorCode::NotFound, err.to_string()),
            VaultSyncError::Validation(msg) => (ErrorCode::Validation, msg.clone()),
            _ => (ErrorCode::Internal, "internal server error".to_string()),
        };
        Self { error, message }
    }

    /// Map back into the client-side taxonomy.  `target` names the secret
    /// the call was about, for `not_found`.
    pub fn into_error(self, target: Option<(SecretType, &str)>) -> VaultSyncError {
        match self.error {
            ErrorCode::MissingAuthorization => VaultSyncError::MissingAuthorization,
            ErrorCode::InvalidCredential => VaultSyncError::InvalidCredential(self.message),
            ErrorCode::NotFound => match target {
                Some((secret_type, name)) => VaultSyncError::SecretNotFound {
                    secret_type,
                    name: name.to_string(),
                },
                None => VaultSyncError::Remote(self.message),
            },
            ErrorCode::Validation => VaultSyncError::Validation(self.message),
            ErrorCode::Internal => VaultSyncError::Remote(self.message),
        }
    }
}

/// Body of `POST /api/v1/secrets/{type}/delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteRequest {
    pub secret_name: String,
}

/// First frame of every RPC connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub authorization: String,
}

/// Second frame: the operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RpcCall {
    Save {
        envelope: EncryptedEnvelope,
    },
    Get {
        secret_type: SecretType,
        secret_name: String,
    },
    List {
        secret_type: SecretType,
    },
    Delete {
        secret_type: SecretType,
        secret_name: String,
    },
}

impl RpcCall {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Save { .. } => "save",
            Self::Get { .. } => "get",
            Self::List { .. } => "list",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Server reply frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum RpcFrame {
    /// Save or delete committed.
    Done,
    Record { record: RemoteRecord },
    /// Closes a list stream; `count` is the number of records sent.
    End { count: usize },
    Error(ErrorBody),
}

/// Read one frame.  `Ok(None)` on a clean end of stream.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let limit = (MAX_FRAME_BYTES + 1) as u64;
    let n = (&mut *reader)
        .take(limit)
        .read_line(&mut line)
        .await
        .map_err(|e| VaultSyncError::Transport(format!("read failed: {e}")))?;

    if n == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') {
        if line.len() > MAX_FRAME_BYTES {
            return Err(VaultSyncError::Validation(format!(
                "frame exceeds {MAX_FRAME_BYTES} bytes"
            )));
        }
        return Err(VaultSyncError::Transport("truncated frame".into()));
    }

    serde_json::from_str(line.trim_end())
        .map(Some)
        .map_err(|e| VaultSyncError::Validation(format!("malformed frame: {e}")))
}

pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = serde_json::to_vec(frame)?;
    buf.push(b'\n');
    writer
        .write_all(&buf)
        .await
        .map_err(|e| VaultSyncError::Transport(format!("write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| VaultSyncError::Transport(format!("write failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn error_body_round_trips_taxonomy() {
        let body = ErrorBody::from_error(&VaultSyncError::MissingAuthorization);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"error": "missing_authorization", "message": "invalid or missing authorization"})
        );
        assert!(matches!(
            body.into_error(None),
            VaultSyncError::MissingAuthorization
        ));

        let not_found = ErrorBody::from_error(&VaultSyncError::SecretNotFound {
            secret_type: SecretType::Text,
            name: "n".into(),
        });
        assert!(not_found
            .into_error(Some((SecretType::Text, "n")))
            .is_not_found());
    }

    #[test]
    fn internal_details_are_not_sent() {
        let body = ErrorBody::from_error(&VaultSyncError::Storage("disk /var/db full".into()));
        assert_eq!(body.error, ErrorCode::Internal);
        assert!(!body.message.contains("/var/db"));
    }

    #[test]
    fn call_frames_are_tagged_by_op() {
        let call = RpcCall::List {
            secret_type: SecretType::BankCard,
        };
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            serde_json::json!({"op": "list", "secret_type": "bank_card"})
        );
        let end: RpcFrame = serde_json::from_str(r#"{"frame":"end","count":2}"#).unwrap();
        assert!(matches!(end, RpcFrame::End { count: 2 }));
    }

    #[tokio::test]
    async fn frames_round_trip_over_a_stream() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &RpcFrame::Done).await.unwrap();
        write_frame(&mut buf, &RpcFrame::End { count: 0 }).await.unwrap();

        let mut reader = BufReader::new(buf.as_slice());
        let first: Option<RpcFrame> = read_frame(&mut reader).await.unwrap();
        assert!(matches!(first, Some(RpcFrame::Done)));
        let second: Option<RpcFrame> = read_frame(&mut reader).await.unwrap();
        assert!(matches!(second, Some(RpcFrame::End { count: 0 })));
        let eof: Option<RpcFrame> = read_frame(&mut reader).await.unwrap();
        assert!(eof.is_none());
    }

    #[tokio::test]
    async fn unterminated_frame_is_an_error() {
        let mut reader = BufReader::new(&b"{\"frame\":\"done\"}"[..]);
        let result: Result<Option<RpcFrame>> = read_frame(&mut reader).await;
        assert!(result.is_err());
    }
}
