//! `vaultsync sync` — push local secrets to the server by policy.

use std::future::Future;

use crate::cli::output;
use crate::cli::prompt::ConsolePrompt;
use crate::cli::{runtime, selected_types, Cli, RemoteSession};
use crate::errors::{Result, VaultSyncError};
use crate::sync::{ResolutionPolicy, SyncEngine, SyncReport, SyncStatus};
use crate::transport::{self, CallContext, CancelHandle, TransportKind};
use crate::vault::SecretType;

/// Execute the `sync` command.
pub fn execute(
    cli: &Cli,
    policy: Option<ResolutionPolicy>,
    transport_kind: Option<TransportKind>,
    types: &[SecretType],
) -> Result<()> {
    let session = RemoteSession::open(cli)?;
    let policy = policy.unwrap_or(session.settings.policy);
    let kind = transport_kind.unwrap_or(session.settings.transport);
    let types = selected_types(types);

    let prompt = ConsolePrompt;
    let mut engine = SyncEngine::new(
        &session.store,
        transport::connect(kind, &session.settings)?,
        &session.keys,
        &session.credential,
    )
    .with_policy(policy);
    if policy == ResolutionPolicy::Interactive {
        engine = engine.with_prompt(&prompt);
    }

    output::info(&format!("Syncing over {kind} with policy {policy}..."));
    let (ctx, cancel) = CallContext::new(session.settings.request_timeout());
    let report = run_cancellable(cancel, engine.run(&ctx, &types))?;

    finish(&report, "Sync")
}

/// Block on `fut`; Ctrl-C fires `cancel` instead of killing the process.
pub(crate) fn run_cancellable<F>(cancel: CancelHandle, fut: F) -> Result<SyncReport>
where
    F: Future<Output = Result<SyncReport>>,
{
    runtime()?.block_on(async move {
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
        let report = fut.await;
        watcher.abort();
        report
    })
}

/// Print the report and turn a partial run into a non-zero exit.
pub(crate) fn finish(report: &SyncReport, what: &str) -> Result<()> {
    output::print_sync_report(report);
    match report.status() {
        SyncStatus::Done => {
            output::success(&format!("{what} complete"));
            Ok(())
        }
        SyncStatus::Failed {
            failed,
            interrupted,
        } => {
            let mut summary = format!("{what} finished with {} failed item(s)", failed.len());
            if !failed.is_empty() {
                let names: Vec<String> = failed.iter().map(|(t, n)| format!("{t}/{n}")).collect();
                summary.push_str(&format!(": {}", names.join(", ")));
            }
            if interrupted {
                summary.push_str(" (interrupted)");
            }
            Err(VaultSyncError::CommandFailed(summary))
        }
    }
}
