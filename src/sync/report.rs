//! Outcome of a sync or download run.

use std::fmt;

use crate::errors::{ErrorKind, VaultSyncError};
use crate::vault::SecretType;

/// What happened to one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    /// Sealed and saved to the remote.
    Pushed,
    /// Both sides had a version; the remote one was kept, nothing written.
    KeptRemote,
    /// The operator declined; nothing written.
    Skipped,
    /// Nothing to do (local-only under server-wins, or already present on download).
    Unchanged,
    /// Opened from the remote and written to the local vault.
    Pulled,
}

impl fmt::Display for ItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pushed => "pushed",
            Self::KeptRemote => "kept remote",
            Self::Skipped => "skipped",
            Self::Unchanged => "unchanged",
            Self::Pulled => "pulled",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Secret name, or `*` when the whole type failed to list.
    pub name: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ItemFailure {
    pub fn new(name: impl Into<String>, err: &VaultSyncError) -> Self {
        Self {
            name: name.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Per-type results.
#[derive(Debug, Clone)]
pub struct TypeReport {
    pub secret_type: SecretType,
    pub applied: Vec<(String, ItemAction)>,
    pub failed: Vec<ItemFailure>,
    /// Last item that completed successfully; a retry can resume after it.
    pub last_processed: Option<String>,
    /// Cancellation stopped this type before every item was visited.
    pub interrupted: bool,
}

impl TypeReport {
    pub fn new(secret_type: SecretType) -> Self {
        Self {
            secret_type,
            applied: Vec::new(),
            failed: Vec::new(),
            last_processed: None,
            interrupted: false,
        }
    }

    pub(crate) fn record_applied(&mut self, name: &str, action: ItemAction) {
        self.applied.push((name.to_string(), action));
        self.last_processed = Some(name.to_string());
    }

    pub(crate) fn record_failure(&mut self, name: &str, err: &VaultSyncError) {
        self.failed.push(ItemFailure::new(name, err));
    }

    pub fn count(&self, action: ItemAction) -> usize {
        self.applied.iter().filter(|(_, a)| *a == action).count()
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Done,
    /// Some items failed or the run was cancelled; everything else stands.
    Failed {
        failed: Vec<(SecretType, String)>,
        interrupted: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub types: Vec<TypeReport>,
}

impl SyncReport {
    pub fn status(&self) -> SyncStatus {
        let failed = self.failed_items();
        let interrupted = self.is_interrupted();
        if failed.is_empty() && !interrupted {
            SyncStatus::Done
        } else {
            SyncStatus::Failed {
                failed,
                interrupted,
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.status() == SyncStatus::Done
    }

    pub fn is_interrupted(&self) -> bool {
        self.types.iter().any(|t| t.interrupted)
    }

    /// Every failed `(type, name)` pair.
    pub fn failed_items(&self) -> Vec<(SecretType, String)> {
        self.types
            .iter()
            .flat_map(|t| t.failed.iter().map(|f| (t.secret_type, f.name.clone())))
            .collect()
    }

    pub fn count(&self, action: ItemAction) -> usize {
        self.types.iter().map(|t| t.count(action)).sum()
    }

    pub fn for_type(&self, secret_type: SecretType) -> Option<&TypeReport> {
        self.types.iter().find(|t| t.secret_type == secret_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_run_is_done() {
        let mut text = TypeReport::new(SecretType::Text);
        text.record_applied("a", ItemAction::Pushed);
        let report = SyncReport { types: vec![text] };
        assert!(report.is_done());
        assert_eq!(report.count(ItemAction::Pushed), 1);
    }

    #[test]
    fn failures_make_the_run_partial() {
        let mut text = TypeReport::new(SecretType::Text);
        text.record_applied("a", ItemAction::Pushed);
        text.record_failure("b", &VaultSyncError::Transport("reset".into()));
        let report = SyncReport { types: vec![text] };

        assert_eq!(
            report.status(),
            SyncStatus::Failed {
                failed: vec![(SecretType::Text, "b".to_string())],
                interrupted: false,
            }
        );
        let type_report = report.for_type(SecretType::Text).unwrap();
        assert_eq!(type_report.last_processed.as_deref(), Some("a"));
        assert_eq!(type_report.failed[0].kind, ErrorKind::Transport);
    }

    #[test]
    fn interruption_alone_is_not_done() {
        let mut text = TypeReport::new(SecretType::Text);
        text.interrupted = true;
        let report = SyncReport { types: vec![text] };
        assert!(!report.is_done());
    }
}
