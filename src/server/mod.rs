//! Zero-knowledge remote for sealed envelopes.
//!
//! The server stores and returns `EncryptedEnvelope`s scoped by the owner
//! its resolver derives from each call's credential.  It serves the same
//! `SecretService` over HTTP (`http`) and over the streaming RPC protocol
//! (`rpc`).

pub mod config;
pub mod error;
pub mod http;
pub mod rpc;
pub mod service;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::auth::TokenAuthority;
use crate::errors::{Result, VaultSyncError};

pub use config::{Limits, ServerConfig};
pub use service::SecretService;
pub use store::EnvelopeStore;

/// Open storage and build the token resolver described by `config`.
pub fn build_service(config: &ServerConfig) -> Result<Arc<SecretService>> {
    let store = EnvelopeStore::open(&config.database_path)?;
    let authority = TokenAuthority::new(config.token_secret()?, config.token_issuer.clone())?;
    Ok(Arc::new(SecretService::new(Arc::new(authority), store)))
}

/// Both listeners, running in the background.
pub struct ServerHandle {
    http_addr: SocketAddr,
    rpc_addr: SocketAddr,
    stop: watch::Sender<bool>,
    http_task: JoinHandle<std::io::Result<()>>,
    rpc_task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.http_addr)
    }

    /// Stop accepting, let in-flight HTTP requests finish, then return.
    pub async fn shutdown(self) -> Result<()> {
        self.stop.send_replace(true);
        self.rpc_task
            .await
            .map_err(|e| VaultSyncError::CommandFailed(format!("rpc listener: {e}")))?;
        self.http_task
            .await
            .map_err(|e| VaultSyncError::CommandFailed(format!("http listener: {e}")))??;
        Ok(())
    }
}

fn stopped(mut rx: watch::Receiver<bool>) -> impl std::future::Future<Output = ()> + Send {
    async move {
        // A dropped sender also means stop.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

/// Bind both listeners and start serving `service`.
pub async fn start(
    http_addr: &str,
    rpc_addr: &str,
    limits: Limits,
    service: Arc<SecretService>,
) -> Result<ServerHandle> {
    let http_listener = TcpListener::bind(http_addr).await?;
    let rpc_listener = TcpListener::bind(rpc_addr).await?;
    let http_addr = http_listener.local_addr()?;
    let rpc_addr = rpc_listener.local_addr()?;

    let (stop, rx) = watch::channel(false);

    let router = http::build_router(
        http::AppState {
            service: service.clone(),
        },
        limits.max_payload_bytes,
    );
    let http_task = tokio::spawn({
        let rx = rx.clone();
        async move {
            axum::serve(http_listener, router)
                .with_graceful_shutdown(stopped(rx))
                .await
        }
    });
    let rpc_task = tokio::spawn(rpc::serve(
        rpc_listener,
        service,
        limits.rpc_read_timeout,
        stopped(rx),
    ));

    info!(%http_addr, %rpc_addr, "vaultsync server listening");
    Ok(ServerHandle {
        http_addr,
        rpc_addr,
        stop,
        http_task,
        rpc_task,
    })
}

/// Serve with `config` until Ctrl-C or SIGTERM.
pub async fn run(config: &ServerConfig) -> Result<()> {
    let service = build_service(config)?;
    let handle = start(
        &config.http_addr,
        &config.rpc_addr,
        config.limits(),
        service,
    )
    .await?;

    shutdown_signal().await;
    info!("shutting down");
    handle.shutdown().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => warn!(?err, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
