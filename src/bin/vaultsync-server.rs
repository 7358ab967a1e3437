//! vaultsync server
//!
//! Stores sealed envelopes for their owners and serves them over HTTP and
//! the streaming RPC protocol.  It never sees keys or plaintext.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vaultsync::auth::{OwnerId, TokenAuthority};
use vaultsync::errors::{Result, VaultSyncError};
use vaultsync::server::{self, ServerConfig};

#[derive(Parser)]
#[command(
    name = "vaultsync-server",
    about = "vaultsync zero-knowledge sync server",
    version
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "vaultsync-server.toml")]
    config: PathBuf,

    /// HTTP listen address override
    #[arg(long)]
    http: Option<String>,

    /// RPC listen address override
    #[arg(long)]
    rpc: Option<String>,

    /// Database path override
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve HTTP and RPC until interrupted (default)
    Serve,

    /// Print a bearer token for an owner
    IssueToken {
        /// Owner identity to embed in the token
        #[arg(long)]
        owner: String,

        /// Token lifetime in seconds (default from config)
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let filter = match "info".parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = if cli.config.exists() {
        ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        ServerConfig::default()
    };

    if let Some(http) = cli.http {
        cfg.http_addr = http;
    }
    if let Some(rpc) = cli.rpc {
        cfg.rpc_addr = rpc;
    }
    if let Some(database) = cli.database {
        cfg.database_path = database;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::run(&cfg).await,
        Command::IssueToken { owner, ttl_secs } => {
            let authority = TokenAuthority::new(cfg.token_secret()?, cfg.token_issuer.clone())?;
            let ttl = Duration::from_secs(ttl_secs.unwrap_or(cfg.token_ttl_secs));
            if ttl.is_zero() {
                return Err(VaultSyncError::ConfigError(
                    "token lifetime must be positive".to_string(),
                ));
            }
            let credential = authority.issue(&OwnerId::new(owner)?, ttl)?;
            println!("{}", credential.as_str());
            Ok(())
        }
    }
}
