//! # Rampart Backup — versioned structural snapshots and restore
//!
//! The recovery side of the protection engine. The [`backup_store`] captures
//! validated, bounded-history snapshots of a workspace's full structure
//! (containers with permission grants, editable roles); the
//! [`restore_engine`] reconciles live structure back to the most recent
//! valid version, falling through older versions on failure.

pub mod backup_store;
pub mod restore_engine;
pub mod types;

mod tests;

pub use backup_store::BackupStore;
pub use restore_engine::RestoreEngine;
pub use types::{BackupOutcome, BackupVersion, RestoreOutcome, RestoreStats};
