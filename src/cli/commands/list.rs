//! `vaultsync list` — display local secrets in a table.

use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::errors::Result;
use crate::vault::SecretType;

/// Execute the `list` command.
pub fn execute(cli: &Cli, secret_type: Option<SecretType>) -> Result<()> {
    let store = open_store(cli)?;
    let secrets = store.list_metadata(secret_type)?;

    output::info(&format!("{} secret(s)", secrets.len()));
    output::print_secrets_table(&secrets);

    Ok(())
}
