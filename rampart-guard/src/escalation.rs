//! Escalation Ledger — rolling 24h trigger history per actor.
//!
//! Answers "how suspicious is this actor across repeated attempts",
//! decoupled from single-burst detection. Cooldowns lengthen with each
//! trigger inside the trailing 24h; the orchestrator uses the attempt count
//! to pick sanction severity. Pruning is lazy: every access trims the
//! history to the horizon before computing anything.

use rampart_core::sharded::ShardedMap;
use rampart_core::ESCALATION_HORIZON_SECS;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Cooldown schedule by number of prior triggers in the trailing 24h.
const COOLDOWN_SCHEDULE_SECS: [i64; 4] = [300, 900, 1800, 3600];

/// Cooldown for a trigger with `prior_triggers` already in the trailing
/// 24h: 0 → 5m, 1 → 15m, 2 → 30m, 3+ → 60m.
pub fn schedule_cooldown(prior_triggers: u32) -> i64 {
    COOLDOWN_SCHEDULE_SECS[(prior_triggers as usize).min(COOLDOWN_SCHEDULE_SECS.len() - 1)]
}

#[derive(Debug, Clone, Default)]
pub struct EscalationRecord {
    pub trigger_timestamps: Vec<i64>,
    pub last_trigger_at: i64,
}

impl EscalationRecord {
    fn prune(&mut self, now: i64) {
        let cutoff = now - ESCALATION_HORIZON_SECS;
        self.trigger_timestamps.retain(|&t| t > cutoff);
    }
}

pub struct EscalationLedger {
    records: ShardedMap<String, EscalationRecord>,
    total_triggers: AtomicU64,
}

impl EscalationLedger {
    pub fn new() -> Self {
        Self {
            records: ShardedMap::new(),
            total_triggers: AtomicU64::new(0),
        }
    }

    /// Triggers already on record for this actor within the trailing 24h.
    pub fn prior_count(&self, actor_id: &str, now: i64) -> u32 {
        self.records.with_mut(&actor_id.to_string(), |shard| {
            match shard.get_mut(actor_id) {
                Some(rec) => {
                    rec.prune(now);
                    rec.trigger_timestamps.len() as u32
                }
                None => 0,
            }
        })
    }

    /// Cooldown for the trigger happening *now*, from this actor's
    /// prior-trigger count.
    pub fn cooldown_for(&self, actor_id: &str, now: i64) -> i64 {
        schedule_cooldown(self.prior_count(actor_id, now))
    }

    /// Record a trigger and return the new 24h attempt total.
    pub fn record_trigger(&self, actor_id: &str, now: i64) -> u32 {
        self.total_triggers.fetch_add(1, Ordering::Relaxed);
        let count = self.records.with_mut(&actor_id.to_string(), |shard| {
            let rec = shard.entry(actor_id.to_string()).or_default();
            rec.prune(now);
            rec.trigger_timestamps.push(now);
            rec.last_trigger_at = now;
            rec.trigger_timestamps.len() as u32
        });
        debug!(actor = %actor_id, attempts_24h = count, "Escalation trigger recorded");
        count
    }

    /// Drop records whose newest trigger fell off the 24h horizon.
    pub fn sweep(&self, now: i64) -> usize {
        let mut removed = 0;
        let cutoff = now - ESCALATION_HORIZON_SECS;
        self.records.retain_all(|_, rec| {
            if rec.last_trigger_at > cutoff {
                true
            } else {
                removed += 1;
                false
            }
        });
        removed
    }

    pub fn tracked_actors(&self) -> usize {
        self.records.len()
    }

    pub fn total_triggers(&self) -> u64 {
        self.total_triggers.load(Ordering::Relaxed)
    }
}

impl Default for EscalationLedger {
    fn default() -> Self {
        Self::new()
    }
}
