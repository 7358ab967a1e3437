//! Reconciliation of the local vault against the remote.
//!
//! For each local secret of a type the engine fetches the remote
//! counterpart, lets the policy decide, and pushes when the decision says
//! so.  It never overwrites local data during a sync; pulling is the
//! separate `download` operation.  A failing item is recorded and the
//! loop moves on.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::policy::{ConflictDecision, ConflictPrompt, ResolutionPolicy};
use super::report::{ItemAction, SyncReport, TypeReport};
use crate::auth::BearerCredential;
use crate::crypto::{open_content, seal, OwnerKeyPair};
use crate::errors::{Result, VaultSyncError};
use crate::transport::{CallContext, RemoteRecord, SecretChannel, SecretTransport};
use crate::vault::{LocalCache, Secret, SecretType};

pub struct SyncEngine<'a> {
    cache: &'a dyn LocalCache,
    transport: Arc<dyn SecretTransport>,
    keys: &'a OwnerKeyPair,
    credential: &'a BearerCredential,
    policy: ResolutionPolicy,
    prompt: Option<&'a dyn ConflictPrompt>,
}

/// Errors that stop the run instead of failing one item.
fn is_interruption(err: &VaultSyncError) -> bool {
    matches!(err, VaultSyncError::Cancelled | VaultSyncError::UserCancelled)
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        cache: &'a dyn LocalCache,
        transport: Arc<dyn SecretTransport>,
        keys: &'a OwnerKeyPair,
        credential: &'a BearerCredential,
    ) -> Self {
        Self {
            cache,
            transport,
            keys,
            credential,
            policy: ResolutionPolicy::TakeLocal,
            prompt: None,
        }
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prompt(mut self, prompt: &'a dyn ConflictPrompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    fn prompt(&self) -> Result<&'a dyn ConflictPrompt> {
        self.prompt.ok_or_else(|| {
            VaultSyncError::ConfigError("interactive policy needs a conflict prompt".into())
        })
    }

    /// Reconcile every local secret of `types`, one type after another.
    ///
    /// Only a failure to read the local vault aborts the run; everything
    /// else ends up in the report.
    pub async fn run(&self, ctx: &CallContext, types: &[SecretType]) -> Result<SyncReport> {
        if self.policy == ResolutionPolicy::Interactive {
            self.prompt()?;
        }

        let mut report = SyncReport::default();
        for &secret_type in types {
            let type_report = if report.is_interrupted() || ctx.is_cancelled() {
                let mut skipped = TypeReport::new(secret_type);
                skipped.interrupted = true;
                skipped
            } else {
                self.sync_type(ctx, SecretChannel::new(self.transport.clone(), secret_type))
                    .await?
            };
            report.types.push(type_report);
        }

        info!(
            policy = %self.policy,
            pushed = report.count(ItemAction::Pushed),
            failed = report.failed_items().len(),
            interrupted = report.is_interrupted(),
            "sync finished"
        );
        Ok(report)
    }

    async fn sync_type(&self, ctx: &CallContext, channel: SecretChannel) -> Result<TypeReport> {
        let secret_type = channel.secret_type();
        let mut report = TypeReport::new(secret_type);
        let locals = self.cache.list_by_type(secret_type)?;
        debug!(%secret_type, count = locals.len(), protocol = channel.protocol(), "enumerated local secrets");

        for local in &locals {
            if ctx.is_cancelled() {
                report.interrupted = true;
                break;
            }
            match self.sync_item(ctx, &channel, local).await {
                Ok(action) => {
                    debug!(%secret_type, name = %local.name, %action, "item reconciled");
                    report.record_applied(&local.name, action);
                }
                Err(err) if is_interruption(&err) => {
                    report.interrupted = true;
                    break;
                }
                Err(err) => {
                    warn!(%secret_type, name = %local.name, kind = %err.kind(), error = %err, "item failed");
                    report.record_failure(&local.name, &err);
                }
            }
        }
        Ok(report)
    }

    async fn sync_item(
        &self,
        ctx: &CallContext,
        channel: &SecretChannel,
        local: &Secret,
    ) -> Result<ItemAction> {
        let remote = match channel.get(ctx, self.credential, &local.name).await {
            Ok(record) => Some(record),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };

        match (self.policy, remote) {
            (ResolutionPolicy::TakeLocal, _) => self.push(ctx, channel, local).await,
            (ResolutionPolicy::TakeRemote, None) => Ok(ItemAction::Unchanged),
            (ResolutionPolicy::TakeRemote, Some(_)) => Ok(ItemAction::KeptRemote),
            (ResolutionPolicy::Interactive, None) => {
                if self.prompt()?.confirm_push(local)? {
                    self.push(ctx, channel, local).await
                } else {
                    Ok(ItemAction::Skipped)
                }
            }
            (ResolutionPolicy::Interactive, Some(record)) => {
                let remote = self.open_record(record, local.secret_type(), &local.name)?;
                match self.prompt()?.resolve(local, &remote)? {
                    ConflictDecision::TakeLocal => self.push(ctx, channel, local).await,
                    ConflictDecision::TakeRemote => Ok(ItemAction::KeptRemote),
                    ConflictDecision::Skip => Ok(ItemAction::Skipped),
                }
            }
        }
    }

    async fn push(
        &self,
        ctx: &CallContext,
        channel: &SecretChannel,
        local: &Secret,
    ) -> Result<ItemAction> {
        let envelope = seal(
            &self.keys.public,
            &local.name,
            local.secret_type(),
            &local.content(),
        )?;
        channel.save(ctx, self.credential, &envelope).await?;
        Ok(ItemAction::Pushed)
    }

    /// Open a remote record, checking it is the one that was asked for.
    fn open_record(
        &self,
        record: RemoteRecord,
        secret_type: SecretType,
        name: &str,
    ) -> Result<Secret> {
        if record.secret_type != secret_type || record.secret_name != name {
            return Err(VaultSyncError::IntegrityFailed(format!(
                "asked for {secret_type}/{name}, remote returned {}/{}",
                record.secret_type, record.secret_name
            )));
        }
        let sealed_at = record.timestamp;
        let envelope = record.into_envelope();
        let content = open_content(&self.keys.private, &envelope)?;
        Ok(Secret::from_content(envelope.secret_name, content, sealed_at))
    }

    /// Pull remote secrets of `types` into the local vault.
    ///
    /// Secrets already present locally are left alone unless `overwrite`.
    pub async fn download(
        &self,
        ctx: &CallContext,
        types: &[SecretType],
        overwrite: bool,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for &secret_type in types {
            let mut type_report = TypeReport::new(secret_type);
            if report.is_interrupted() || ctx.is_cancelled() {
                type_report.interrupted = true;
                report.types.push(type_report);
                continue;
            }

            let channel = SecretChannel::new(self.transport.clone(), secret_type);
            let records = match channel.list(ctx, self.credential).await {
                Ok(records) => records,
                Err(err) if is_interruption(&err) => {
                    type_report.interrupted = true;
                    report.types.push(type_report);
                    continue;
                }
                Err(err) => {
                    warn!(%secret_type, error = %err, "listing remote secrets failed");
                    type_report.record_failure("*", &err);
                    report.types.push(type_report);
                    continue;
                }
            };

            for record in records {
                if ctx.is_cancelled() {
                    type_report.interrupted = true;
                    break;
                }
                let name = record.secret_name.clone();
                match self.pull_one(record, secret_type, overwrite) {
                    Ok(action) => type_report.record_applied(&name, action),
                    Err(err) => {
                        warn!(%secret_type, %name, kind = %err.kind(), error = %err, "download failed");
                        type_report.record_failure(&name, &err);
                    }
                }
            }
            report.types.push(type_report);
        }

        info!(
            pulled = report.count(ItemAction::Pulled),
            failed = report.failed_items().len(),
            "download finished"
        );
        Ok(report)
    }

    fn pull_one(
        &self,
        record: RemoteRecord,
        secret_type: SecretType,
        overwrite: bool,
    ) -> Result<ItemAction> {
        if !overwrite {
            match self.cache.get_by_name(secret_type, &record.secret_name) {
                Ok(_) => return Ok(ItemAction::Unchanged),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }

        let name = record.secret_name.clone();
        let secret = self.open_record(record, secret_type, &name)?;
        secret.validate()?;
        self.cache.upsert_from_remote(&secret)?;
        Ok(ItemAction::Pulled)
    }
}
