//! `vaultsync init` — create the data directory and the owner key pair.

use std::fs;

use crate::cli::output;
use crate::cli::Cli;
use crate::config::Settings;
use crate::crypto::OwnerKeyPair;
use crate::errors::{Result, VaultSyncError};
use crate::vault::SecretStore;

/// Execute the `init` command.
pub fn execute(cli: &Cli, bits: Option<usize>) -> Result<()> {
    let data_dir = &cli.data_dir;

    // 1. Create the data directory if it doesn't exist.
    if !data_dir.exists() {
        fs::create_dir_all(data_dir)?;
        output::info(&format!("Created data directory: {}", data_dir.display()));
    }

    // 2. Refuse to replace an existing key pair: it would orphan every
    //    envelope already on the server.
    if OwnerKeyPair::exists(data_dir) {
        output::tip("Use `vaultsync add` to add secrets to the existing vault.");
        return Err(VaultSyncError::KeysAlreadyExist(data_dir.clone()));
    }

    // 3. Generate and store the key pair.
    let settings = Settings::load(data_dir)?;
    let bits = bits.unwrap_or(settings.key_bits);
    output::info(&format!("Generating {bits}-bit RSA key pair..."));
    let keys = OwnerKeyPair::generate(bits)?;
    keys.save(data_dir)?;
    output::success(&format!("Key pair written to {}", data_dir.display()));

    // 4. Create the local vault (sealed under the new key) and a config file.
    SecretStore::open(data_dir, keys)?;
    if !data_dir.join(Settings::FILE_NAME).exists() {
        settings.save(data_dir)?;
    }

    // 5. Show helpful tips.
    output::tip("Back up owner_key.pem: without it, synced secrets cannot be opened.");
    output::tip("Run `vaultsync add text <NAME>` to add a secret.");
    output::tip("Put your server token in VAULTSYNC_TOKEN or <data-dir>/credential, then `vaultsync sync`.");

    Ok(())
}
