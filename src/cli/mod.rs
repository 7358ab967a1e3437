//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;
pub mod prompt;

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;

use crate::auth::BearerCredential;
use crate::config::{load_credential, Settings};
use crate::crypto::OwnerKeyPair;
use crate::errors::{Result, VaultSyncError};
use crate::sync::ResolutionPolicy;
use crate::transport::TransportKind;
use crate::vault::{SecretStore, SecretType};

/// Environment variable holding the client log filter.
pub const LOG_ENV: &str = "VAULTSYNC_LOG";

/// vaultsync CLI: personal secret manager with zero-knowledge sync.
#[derive(Parser)]
#[command(
    name = "vaultsync",
    about = "Personal secret manager with end-to-end encrypted sync",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory holding keys, vault and config (default: .vaultsync)
    #[arg(long, default_value = ".vaultsync", global = true)]
    pub data_dir: PathBuf,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create the data directory and generate your key pair
    Init {
        /// RSA key size in bits (default from config, 3072)
        #[arg(long)]
        bits: Option<usize>,
    },

    /// Add or replace a secret in the local vault
    Add {
        #[command(subcommand)]
        kind: AddKind,
    },

    /// Show a secret from the local vault
    Get {
        /// Secret type
        #[arg(value_enum)]
        secret_type: SecretType,
        /// Secret name
        name: String,
        /// Print sensitive fields in clear
        #[arg(long)]
        reveal: bool,
        /// Write binary data to this file instead of the terminal
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List secrets in the local vault
    List {
        /// Only show this type
        #[arg(short = 't', long = "type", value_enum)]
        secret_type: Option<SecretType>,
    },

    /// Delete a secret from the local vault
    Delete {
        /// Secret type
        #[arg(value_enum)]
        secret_type: SecretType,
        /// Secret name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
        /// Also delete the remote copy
        #[arg(long)]
        remote: bool,
        /// Transport for --remote (default from config)
        #[arg(long, value_enum)]
        transport: Option<TransportKind>,
    },

    /// Push local secrets to the remote, resolving conflicts by policy
    Sync {
        /// client-wins, server-wins or interactive (default from config)
        #[arg(short, long, value_enum)]
        policy: Option<ResolutionPolicy>,
        /// http or rpc (default from config)
        #[arg(long, value_enum)]
        transport: Option<TransportKind>,
        /// Only sync these types (repeatable; default: all)
        #[arg(short = 't', long = "type", value_enum)]
        types: Vec<SecretType>,
    },

    /// Pull remote secrets into the local vault
    Download {
        /// Only download these types (repeatable; default: all)
        #[arg(short = 't', long = "type", value_enum)]
        types: Vec<SecretType>,
        /// Replace local secrets that already exist
        #[arg(long)]
        overwrite: bool,
        /// http or rpc (default from config)
        #[arg(long, value_enum)]
        transport: Option<TransportKind>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
    },
}

/// Per-type arguments for `add`.
#[derive(clap::Subcommand)]
pub enum AddKind {
    /// A payment card
    BankCard {
        name: String,
        #[arg(long)]
        number: String,
        #[arg(long)]
        holder: String,
        /// Expiry as MM/YY
        #[arg(long)]
        expires: String,
        /// Omit to be prompted without echo
        #[arg(long)]
        cvv: Option<String>,
        /// Extra metadata as key=value (repeatable)
        #[arg(long = "meta", value_parser = parse_meta_pair)]
        meta: Vec<(String, String)>,
    },

    /// A free-form text note
    Text {
        name: String,
        /// Note content (omit to be prompted)
        #[arg(long)]
        content: Option<String>,
        #[arg(long = "meta", value_parser = parse_meta_pair)]
        meta: Vec<(String, String)>,
    },

    /// The contents of a file
    Binary {
        name: String,
        /// File to store
        #[arg(long)]
        file: PathBuf,
        #[arg(long = "meta", value_parser = parse_meta_pair)]
        meta: Vec<(String, String)>,
    },

    /// A username and password
    Credentials {
        name: String,
        #[arg(long)]
        username: String,
        /// Omit to be prompted without echo
        #[arg(long)]
        password: Option<String>,
        #[arg(long = "meta", value_parser = parse_meta_pair)]
        meta: Vec<(String, String)>,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Open the local vault, refusing if `init` has not been run.
pub fn open_store(cli: &Cli) -> Result<SecretStore> {
    let keys = OwnerKeyPair::load(&cli.data_dir)?;
    SecretStore::open(&cli.data_dir, keys)
}

/// Everything a remote command needs: settings, keys, credential and vault.
pub struct RemoteSession {
    pub settings: Settings,
    pub keys: OwnerKeyPair,
    pub credential: BearerCredential,
    pub store: SecretStore,
}

impl RemoteSession {
    pub fn open(cli: &Cli) -> Result<Self> {
        let settings = Settings::load(&cli.data_dir)?;
        let keys = OwnerKeyPair::load(&cli.data_dir)?;
        let credential = load_credential(&cli.data_dir)?;
        let store = SecretStore::open(&cli.data_dir, keys.clone())?;
        Ok(Self {
            settings,
            keys,
            credential,
            store,
        })
    }
}

/// Parse a `key=value` metadata argument.
pub fn parse_meta_pair(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("metadata key is empty in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn meta_map(pairs: &[(String, String)]) -> BTreeMap<String, String> {
    pairs.iter().cloned().collect()
}

/// The selected types, or every type when none were given.
pub fn selected_types(types: &[SecretType]) -> Vec<SecretType> {
    if types.is_empty() {
        return SecretType::ALL.to_vec();
    }
    let mut selected = types.to_vec();
    selected.sort();
    selected.dedup();
    selected
}

/// Runtime for the commands that talk to the remote.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| VaultSyncError::CommandFailed(format!("failed to start runtime: {e}")))
}

/// Send diagnostics to stderr, filtered by `VAULTSYNC_LOG` (default: warn).
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
