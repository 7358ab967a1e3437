//! `vaultsync add` — add or replace a secret in the local vault.

use std::path::Path;

use dialoguer::{Input, Password};

use crate::cli::output;
use crate::cli::{meta_map, open_store, AddKind, Cli};
use crate::errors::{Result, VaultSyncError};
use crate::vault::{BankCard, BinaryBlob, Credentials, Secret, SecretPayload, TextNote};

/// Execute the `add` command.
pub fn execute(cli: &Cli, kind: &AddKind) -> Result<()> {
    let store = open_store(cli)?;
    let secret = build_secret(kind)?;

    let replaced = store.put(&secret)?;
    let what = format!("{}/{}", secret.secret_type(), secret.name);
    if replaced {
        output::success(&format!("Updated {what}"));
    } else {
        output::success(&format!("Added {what}"));
    }
    output::tip("Run `vaultsync sync` to push it to the server.");
    Ok(())
}

fn build_secret(kind: &AddKind) -> Result<Secret> {
    let (name, payload, meta) = match kind {
        AddKind::BankCard {
            name,
            number,
            holder,
            expires,
            cvv,
            meta,
        } => {
            let cvv = match cvv {
                Some(cvv) => cvv.clone(),
                None => prompt_hidden("CVV")?,
            };
            let payload = SecretPayload::BankCard(BankCard {
                number: number.clone(),
                holder: holder.clone(),
                expires: expires.clone(),
                cvv,
            });
            (name, payload, meta)
        }
        AddKind::Text {
            name,
            content,
            meta,
        } => {
            let content = match content {
                Some(content) => content.clone(),
                None => Input::<String>::new()
                    .with_prompt("Content")
                    .interact_text()
                    .map_err(|e| VaultSyncError::CommandFailed(format!("input prompt: {e}")))?,
            };
            (name, SecretPayload::Text(TextNote { content }), meta)
        }
        AddKind::Binary { name, file, meta } => {
            let data = read_file(file)?;
            (name, SecretPayload::Binary(BinaryBlob { data }), meta)
        }
        AddKind::Credentials {
            name,
            username,
            password,
            meta,
        } => {
            let password = match password {
                Some(password) => password.clone(),
                None => prompt_hidden("Password")?,
            };
            let payload = SecretPayload::UsernamePassword(Credentials {
                username: username.clone(),
                password,
            });
            (name, payload, meta)
        }
    };

    let secret = Secret::new(name.clone(), payload).with_meta(meta_map(meta));
    secret.validate()?;
    Ok(secret)
}

fn prompt_hidden(label: &str) -> Result<String> {
    Password::new()
        .with_prompt(label)
        .interact()
        .map_err(|e| VaultSyncError::CommandFailed(format!("{label} prompt: {e}")))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        VaultSyncError::CommandFailed(format!("cannot read {}: {e}", path.display()))
    })
}
