//! Terminal implementation of the conflict prompt.

use dialoguer::{Confirm, Select};

use crate::cli::output;
use crate::errors::{Result, VaultSyncError};
use crate::sync::{ConflictDecision, ConflictPrompt};
use crate::vault::Secret;

/// Asks on the terminal.  Sensitive fields stay masked.
pub struct ConsolePrompt;

fn describe(secret: &Secret) -> String {
    let mut line = format!(
        "{}  (updated {})",
        secret.payload.summary(),
        secret.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    if !secret.meta.is_empty() {
        let meta: Vec<String> = secret.meta.iter().map(|(k, v)| format!("{k}={v}")).collect();
        line.push_str(&format!("  [{}]", meta.join(", ")));
    }
    line
}

fn prompt_error(e: dialoguer::Error) -> VaultSyncError {
    VaultSyncError::CommandFailed(format!("prompt failed: {e}"))
}

impl ConflictPrompt for ConsolePrompt {
    fn confirm_push(&self, local: &Secret) -> Result<bool> {
        output::info(&format!(
            "{}/{} exists only locally: {}",
            local.secret_type(),
            local.name,
            describe(local)
        ));
        Confirm::new()
            .with_prompt("Push it to the server?")
            .default(true)
            .interact_opt()
            .map_err(prompt_error)?
            .ok_or(VaultSyncError::UserCancelled)
    }

    fn resolve(&self, local: &Secret, remote: &Secret) -> Result<ConflictDecision> {
        output::warning(&format!(
            "{}/{} differs between this device and the server",
            local.secret_type(),
            local.name
        ));
        println!("  local:  {}", describe(local));
        println!("  remote: {}", describe(remote));

        let choice = Select::new()
            .with_prompt("Keep which version?")
            .items(&["local (push it)", "remote (leave as is)", "skip"])
            .default(0)
            .interact_opt()
            .map_err(prompt_error)?
            .ok_or(VaultSyncError::UserCancelled)?;

        Ok(match choice {
            0 => ConflictDecision::TakeLocal,
            1 => ConflictDecision::TakeRemote,
            _ => ConflictDecision::Skip,
        })
    }
}
