//! Streaming RPC adapter: newline-delimited JSON frames over TCP.
//!
//! One connection per call.  The client writes a metadata frame carrying
//! the credential, then the call frame, then reads replies until the
//! server closes or sends a terminal frame.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::debug;

use super::context::CallContext;
use super::wire::{read_frame, write_frame, Metadata, RpcCall, RpcFrame};
use super::{RemoteRecord, SecretTransport};
use crate::auth::BearerCredential;
use crate::crypto::EncryptedEnvelope;
use crate::errors::{Result, VaultSyncError};
use crate::vault::SecretType;

type Connection = BufReader<TcpStream>;

pub struct RpcTransport {
    addr: String,
}

impl RpcTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    async fn open(&self, credential: &BearerCredential, call: &RpcCall) -> Result<Connection> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| VaultSyncError::Transport(format!("connect {}: {e}", self.addr)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| VaultSyncError::Transport(e.to_string()))?;

        let mut conn = BufReader::new(stream);
        write_frame(
            &mut conn,
            &Metadata {
                authorization: credential.header_value(),
            },
        )
        .await?;
        write_frame(&mut conn, call).await?;
        debug!(op = call.op(), addr = %self.addr, "rpc call sent");
        Ok(conn)
    }

    /// Issue a unary call and return its single reply frame.
    async fn unary(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        call: RpcCall,
        target: Option<(SecretType, &str)>,
    ) -> Result<RpcFrame> {
        ctx.run(async {
            let mut conn = self.open(credential, &call).await?;
            match read_frame::<_, RpcFrame>(&mut conn).await? {
                Some(RpcFrame::Error(body)) => Err(body.into_error(target)),
                Some(frame) => Ok(frame),
                None => Err(VaultSyncError::Transport(
                    "connection closed before reply".into(),
                )),
            }
        })
        .await
    }

    /// Stream the records of one type as the server emits them.
    ///
    /// The stream ends with an error, never silently, if the connection
    /// drops before the `end` frame or the server's count disagrees with
    /// what was received.
    pub fn list_stream<'a>(
        &'a self,
        ctx: &'a CallContext,
        credential: &'a BearerCredential,
        secret_type: SecretType,
    ) -> impl Stream<Item = Result<RemoteRecord>> + Send + 'a {
        try_stream! {
            let call = RpcCall::List { secret_type };
            let mut conn = ctx.run(self.open(credential, &call)).await?;
            let mut received = 0usize;

            loop {
                let frame = ctx.run(read_frame::<_, RpcFrame>(&mut conn)).await?;
                match frame {
                    Some(RpcFrame::Record { record }) => {
                        if record.secret_type != secret_type {
                            Err(VaultSyncError::Transport(format!(
                                "server sent a {} record in a {} list",
                                record.secret_type, secret_type
                            )))?;
                        }
                        received += 1;
                        yield record;
                    }
                    Some(RpcFrame::End { count }) => {
                        if count != received {
                            Err(VaultSyncError::Transport(format!(
                                "list stream ended after {received} of {count} records"
                            )))?;
                        }
                        break;
                    }
                    Some(RpcFrame::Error(body)) => Err(body.into_error(None))?,
                    Some(RpcFrame::Done) => Err(VaultSyncError::Transport(
                        "unexpected done frame in list stream".into(),
                    ))?,
                    None => Err(VaultSyncError::Transport(
                        "list stream closed before end frame".into(),
                    ))?,
                }
            }
        }
    }
}

fn unexpected(frame: RpcFrame, op: &str) -> VaultSyncError {
    VaultSyncError::Transport(format!("unexpected reply to {op}: {frame:?}"))
}

#[async_trait]
impl SecretTransport for RpcTransport {
    fn protocol(&self) -> &'static str {
        "rpc"
    }

    async fn save(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        envelope: &EncryptedEnvelope,
    ) -> Result<()> {
        let call = RpcCall::Save {
            envelope: envelope.clone(),
        };
        match self.unary(ctx, credential, call, None).await? {
            RpcFrame::Done => Ok(()),
            other => Err(unexpected(other, "save")),
        }
    }

    async fn get(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        secret_type: SecretType,
        name: &str,
    ) -> Result<RemoteRecord> {
        let call = RpcCall::Get {
            secret_type,
            secret_name: name.to_string(),
        };
        match self
            .unary(ctx, credential, call, Some((secret_type, name)))
            .await?
        {
            RpcFrame::Record { record } => Ok(record),
            other => Err(unexpected(other, "get")),
        }
    }

    async fn list(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        secret_type: SecretType,
    ) -> Result<Vec<RemoteRecord>> {
        ctx.run(
            self.list_stream(ctx, credential, secret_type)
                .try_collect::<Vec<_>>(),
        )
        .await
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        credential: &BearerCredential,
        secret_type: SecretType,
        name: &str,
    ) -> Result<()> {
        let call = RpcCall::Delete {
            secret_type,
            secret_name: name.to_string(),
        };
        match self.unary(ctx, credential, call, None).await? {
            RpcFrame::Done => Ok(()),
            other => Err(unexpected(other, "delete")),
        }
    }
}
