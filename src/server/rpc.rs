//! Streaming RPC listener.
//!
//! One task per connection.  The metadata frame is read and the owner
//! resolved before the call frame is parsed.  A peer that does not finish
//! a request frame within the read timeout is disconnected.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::service::SecretService;
use crate::auth::BearerCredential;
use crate::errors::{Result, VaultSyncError};
use crate::transport::wire::{
    read_frame, write_frame, ErrorBody, ErrorCode, Metadata, RpcCall, RpcFrame,
};

/// Accept connections until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    service: Arc<SecretService>,
    read_timeout: Duration,
    shutdown: F,
) where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "rpc connection");
                    tokio::spawn(handle_connection(stream, service.clone(), read_timeout));
                }
                Err(err) => warn!(?err, "rpc accept failed"),
            },
        }
    }
}

async fn handle_connection(stream: TcpStream, service: Arc<SecretService>, read_timeout: Duration) {
    let mut conn = BufReader::new(stream);
    if let Err(err) = serve_call(&mut conn, &service, read_timeout).await {
        let body = ErrorBody::from_error(&err);
        if body.error == ErrorCode::Internal {
            error!(error = %err, "rpc call failed");
        }
        // The peer may already be gone.
        let _ = write_frame(&mut conn, &RpcFrame::Error(body)).await;
    }
}

async fn serve_call(
    conn: &mut BufReader<TcpStream>,
    service: &SecretService,
    read_timeout: Duration,
) -> Result<()> {
    let Ok(metadata) = timeout(read_timeout, read_frame::<_, Metadata>(conn)).await else {
        debug!("rpc peer sent no metadata in time, closing");
        return Ok(());
    };
    let metadata = metadata
        .ok()
        .flatten()
        .ok_or(VaultSyncError::MissingAuthorization)?;
    let credential = BearerCredential::from_authorization_header(Some(&metadata.authorization))?;
    let owner = service.resolve(&credential)?;

    let Ok(call) = timeout(read_timeout, read_frame::<_, RpcCall>(conn)).await else {
        debug!(%owner, "rpc peer sent no call in time, closing");
        return Ok(());
    };
    let call = call?.ok_or_else(|| VaultSyncError::Validation("missing call frame".into()))?;
    debug!(%owner, op = call.op(), "rpc call");

    match call {
        RpcCall::Save { envelope } => {
            service.save(&owner, envelope.secret_type, &envelope)?;
            write_frame(conn, &RpcFrame::Done).await
        }
        RpcCall::Get {
            secret_type,
            secret_name,
        } => {
            let record = service.get(&owner, secret_type, &secret_name)?;
            write_frame(conn, &RpcFrame::Record { record }).await
        }
        RpcCall::List { secret_type } => {
            let records = service.list(&owner, secret_type)?;
            let count = records.len();
            for record in records {
                write_frame(conn, &RpcFrame::Record { record }).await?;
            }
            write_frame(conn, &RpcFrame::End { count }).await
        }
        RpcCall::Delete {
            secret_type,
            secret_name,
        } => {
            service.delete(&owner, secret_type, &secret_name)?;
            write_frame(conn, &RpcFrame::Done).await
        }
    }
}
