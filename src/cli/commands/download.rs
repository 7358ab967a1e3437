//! `vaultsync download` — pull remote secrets into the local vault.

use crate::cli::commands::sync::{finish, run_cancellable};
use crate::cli::output;
use crate::cli::{selected_types, Cli, RemoteSession};
use crate::errors::Result;
use crate::sync::SyncEngine;
use crate::transport::{self, CallContext, TransportKind};
use crate::vault::SecretType;

/// Execute the `download` command.
pub fn execute(
    cli: &Cli,
    types: &[SecretType],
    overwrite: bool,
    transport_kind: Option<TransportKind>,
) -> Result<()> {
    let session = RemoteSession::open(cli)?;
    let kind = transport_kind.unwrap_or(session.settings.transport);
    let types = selected_types(types);

    let engine = SyncEngine::new(
        &session.store,
        transport::connect(kind, &session.settings)?,
        &session.keys,
        &session.credential,
    );

    output::info(&format!("Downloading over {kind}..."));
    if !overwrite {
        output::tip("Secrets that already exist locally are kept; pass --overwrite to replace them.");
    }
    let (ctx, cancel) = CallContext::new(session.settings.request_timeout());
    let report = run_cancellable(cancel, engine.download(&ctx, &types, overwrite))?;

    finish(&report, "Download")
}
