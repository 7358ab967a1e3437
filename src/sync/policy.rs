//! Conflict resolution policy and the operator decision seam.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultSyncError};
use crate::vault::Secret;

/// How the engine settles each local item against the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ResolutionPolicy {
    /// Push every local item, overwriting the remote copy.
    #[serde(rename = "client-wins", alias = "take-local")]
    #[value(name = "client-wins", alias = "take-local")]
    TakeLocal,

    /// Never write; the remote copy stays authoritative.
    #[serde(rename = "server-wins", alias = "take-remote")]
    #[value(name = "server-wins", alias = "take-remote")]
    TakeRemote,

    /// Ask the operator per item.
    #[serde(rename = "interactive")]
    Interactive,
}

impl fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TakeLocal => "client-wins",
            Self::TakeRemote => "server-wins",
            Self::Interactive => "interactive",
        })
    }
}

impl FromStr for ResolutionPolicy {
    type Err = VaultSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "client-wins" | "take-local" => Ok(Self::TakeLocal),
            "server-wins" | "take-remote" => Ok(Self::TakeRemote),
            "interactive" => Ok(Self::Interactive),
            other => Err(VaultSyncError::ConfigError(format!(
                "unknown policy '{other}' (expected client-wins, server-wins or interactive)"
            ))),
        }
    }
}

/// The operator's answer to a two-sided conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    TakeLocal,
    TakeRemote,
    Skip,
}

/// Decision callback used by the interactive policy.
///
/// The engine never does console I/O itself; the CLI passes a prompt that
/// does, tests pass a scripted one.
pub trait ConflictPrompt {
    /// The item exists only locally.  `true` pushes it.
    fn confirm_push(&self, local: &Secret) -> Result<bool>;

    /// Both sides hold a version.  `remote` is already opened.
    fn resolve(&self, local: &Secret, remote: &Secret) -> Result<ConflictDecision>;
}

/// Replays canned answers and records what it was asked.
///
/// Once the script runs out it declines pushes and skips conflicts.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    pushes: Mutex<VecDeque<bool>>,
    decisions: Mutex<VecDeque<ConflictDecision>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(
        pushes: impl IntoIterator<Item = bool>,
        decisions: impl IntoIterator<Item = ConflictDecision>,
    ) -> Self {
        Self {
            pushes: Mutex::new(pushes.into_iter().collect()),
            decisions: Mutex::new(decisions.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Names of the secrets the engine asked about, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn record(&self, name: &str) {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(name.to_string());
        }
    }
}

impl ConflictPrompt for ScriptedPrompt {
    fn confirm_push(&self, local: &Secret) -> Result<bool> {
        self.record(&local.name);
        Ok(self
            .pushes
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(false))
    }

    fn resolve(&self, local: &Secret, _remote: &Secret) -> Result<ConflictDecision> {
        self.record(&local.name);
        Ok(self
            .decisions
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(ConflictDecision::Skip))
    }
}
