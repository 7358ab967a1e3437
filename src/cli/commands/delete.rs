//! `vaultsync delete` — remove a secret locally and optionally remotely.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{open_store, runtime, Cli, RemoteSession};
use crate::errors::{Result, VaultSyncError};
use crate::transport::{self, CallContext, SecretChannel, TransportKind};
use crate::vault::SecretType;

/// Execute the `delete` command.
pub fn execute(
    cli: &Cli,
    secret_type: SecretType,
    name: &str,
    force: bool,
    remote: bool,
    transport_kind: Option<TransportKind>,
) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let target = if remote { " here and on the server" } else { "" };
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {secret_type}/{name}{target}?"))
            .default(false)
            .interact()
            .map_err(|e| VaultSyncError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let store = open_store(cli)?;
    let removed = store.delete(secret_type, name)?;

    if remote {
        let session = RemoteSession::open(cli)?;
        let kind = transport_kind.unwrap_or(session.settings.transport);
        let channel = SecretChannel::new(transport::connect(kind, &session.settings)?, secret_type);
        let ctx = CallContext::with_timeout(session.settings.request_timeout());
        runtime()?.block_on(channel.delete(&ctx, &session.credential, name))?;
        output::success(&format!("Deleted {secret_type}/{name} from the server"));
    }

    if removed {
        output::success(&format!("Deleted {secret_type}/{name}"));
    } else if !remote {
        return Err(VaultSyncError::SecretNotFound {
            secret_type,
            name: name.to_string(),
        });
    }

    Ok(())
}
