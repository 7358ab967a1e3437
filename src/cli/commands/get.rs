//! `vaultsync get` — show one secret from the local vault.

use std::path::Path;

use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::errors::Result;
use crate::vault::{LocalCache, SecretPayload, SecretType};

/// Execute the `get` command.
pub fn execute(
    cli: &Cli,
    secret_type: SecretType,
    name: &str,
    reveal: bool,
    out: Option<&Path>,
) -> Result<()> {
    let store = open_store(cli)?;
    let secret = store.get_by_name(secret_type, name)?;

    // Binary payloads can be written straight to a file.
    if let (Some(path), SecretPayload::Binary(blob)) = (out, &secret.payload) {
        std::fs::write(path, &blob.data)?;
        output::success(&format!(
            "Wrote {} bytes to {}",
            blob.data.len(),
            path.display()
        ));
        return Ok(());
    }

    output::print_secret(&secret, reveal);
    if !reveal {
        output::tip("Pass --reveal to show sensitive fields.");
    }
    Ok(())
}
