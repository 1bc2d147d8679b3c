//! # Rampart Guard — burst detection and response orchestration
//!
//! The detection side of the protection engine. Administrative events flow
//! from the host into the [`orchestrator::ProtectionOrchestrator`], which
//! consults per-workspace settings and exception lists, feeds the
//! [`rate_tracker::RateTracker`], and on a trigger sanctions the actor,
//! records the attempt in the [`escalation::EscalationLedger`], and invokes
//! the restore engine from `rampart-backup`.
//!
//! The [`sampler::SnapshotSampler`] runs independently of actor attribution
//! as a defense-in-depth signal of abnormally fast structural change.

pub mod escalation;
pub mod orchestrator;
pub mod principal_cache;
pub mod rate_tracker;
pub mod sampler;
pub mod settings;
pub mod types;


pub use orchestrator::ProtectionOrchestrator;
pub use rate_tracker::RateTracker;
pub use types::{EventDisposition, IgnoreReason, RecordOutcome};
