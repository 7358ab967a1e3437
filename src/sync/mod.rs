//! Sync module — reconciles the local vault with the remote envelope store.
//!
//! This module provides:
//! - Resolution policies and the conflict decision seam (`policy`)
//! - Per-run, per-type outcome reports (`report`)
//! - The reconciliation and download loops (`engine`)

pub mod engine;
pub mod policy;
pub mod report;

pub use engine::SyncEngine;
pub use policy::{ConflictDecision, ConflictPrompt, ResolutionPolicy, ScriptedPrompt};
pub use report::{ItemAction, ItemFailure, SyncReport, SyncStatus, TypeReport};
