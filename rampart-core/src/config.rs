use serde::{Deserialize, Serialize};

use crate::types::ContainerKind;

/// Tuning for the detection side: sweep cadence, cache TTLs, and the
/// sampler's velocity threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Cadence of the safety-net reaper that evicts stale counters and
    /// expired suspensions.
    pub sweep_interval_secs: u64,
    /// Floor for reaper eviction of counters whose lazy expiry never ran.
    /// A counter is evicted once both this age and its own window have
    /// passed.
    pub counter_max_age_secs: i64,
    /// TTL for cached per-workspace protection settings.
    pub settings_ttl_secs: i64,
    /// TTL for cached principal identity lookups.
    pub principal_ttl_secs: i64,
    /// Sampling period for the structural snapshot sampler.
    pub sampler_period_secs: u64,
    /// Deletions or creations per second above which the sampler reports a
    /// burst.
    pub sampler_rate_per_sec: f64,
    /// History purge window passed to the sanction provider on a ban.
    pub purge_window_secs: i64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            counter_max_age_secs: 60,
            settings_ttl_secs: 15,
            principal_ttl_secs: 300,
            sampler_period_secs: 5,
            sampler_rate_per_sec: 2.0,
            purge_window_secs: 24 * 60 * 60,
        }
    }
}

/// Tuning for the recovery side: history depth, validation policy, and
/// pacing against platform rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Retained backup versions per workspace, newest first.
    pub max_versions: usize,
    /// Container kinds that satisfy the "at least one postable container"
    /// validation rule. A policy surface, not a hardcoded list.
    pub postable_kinds: Vec<ContainerKind>,
    /// Delay between non-category container creations during restore.
    pub create_pace_ms: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_versions: 3,
            postable_kinds: vec![
                ContainerKind::Text,
                ContainerKind::Forum,
                ContainerKind::Announcement,
            ],
            create_pace_ms: 250,
        }
    }
}
