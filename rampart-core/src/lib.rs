//! # Rampart Core — shared infrastructure for the protection engine
//!
//! Everything in here is platform-agnostic plumbing used by both the
//! detection side (`rampart-guard`) and the recovery side (`rampart-backup`):
//! the error taxonomy, the collaborator trait seams, structural record
//! types, and the small concurrent containers the engines are built on
//! (sharded maps, TTL caches, single-flight guards).

pub mod compression;
pub mod config;
pub mod error;
pub mod providers;
pub mod sharded;
pub mod single_flight;
pub mod ttl_cache;
pub mod types;

pub use config::{BackupConfig, GuardConfig};
pub use error::{RampartError, RampartResult};

/// Rolling history horizon for the escalation ledger, in seconds.
pub const ESCALATION_HORIZON_SECS: i64 = 24 * 60 * 60;
