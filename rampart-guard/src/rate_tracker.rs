//! Rate Tracker — per-(workspace, actor, action-kind) burst detection.
//!
//! Each key gets a fixed-length bucket: the first event starts the window,
//! later events increment the count, and reaching the threshold inside the
//! window triggers. The bucket design is deliberate — bounded memory and
//! O(1) per event, accepting the known boundary false negative of two
//! sub-threshold bursts straddling a window edge.
//!
//! Expiry is lazy (a dead window is replaced on the next event for its key)
//! with [`RateTracker::sweep`] as the safety net against keys that never see
//! another event.

use crate::escalation::EscalationLedger;
use crate::types::{IgnoreReason, RecordOutcome};
use rampart_core::sharded::ShardedMap;
use rampart_core::types::{AdminActionKind, AdminEvent, ProtectionSettings};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_RECENT_EVENTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub workspace: String,
    pub actor: String,
    pub kind: AdminActionKind,
}

#[derive(Debug, Clone)]
pub struct ActionCounter {
    pub count: u32,
    pub window_started_at: i64,
    /// Window length this counter was opened with; the sweep must not
    /// evict a counter whose own window is still live.
    pub window_secs: i64,
    pub recent_events: Vec<(i64, String)>,
}

pub struct RateTracker {
    counters: ShardedMap<CounterKey, ActionCounter>,
    /// (workspace, actor) → suspension expiry.
    suspensions: ShardedMap<(String, String), i64>,
    ledger: Arc<EscalationLedger>,
    counter_max_age_secs: i64,
    events_counted: AtomicU64,
    events_ignored: AtomicU64,
    triggers: AtomicU64,
}

impl RateTracker {
    pub fn new(ledger: Arc<EscalationLedger>, counter_max_age_secs: i64) -> Self {
        Self {
            counters: ShardedMap::new(),
            suspensions: ShardedMap::new(),
            ledger,
            counter_max_age_secs,
            events_counted: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            triggers: AtomicU64::new(0),
        }
    }

    /// Feed one event. `exempt` carries the orchestrator-resolved exception
    /// checks (allow-list, verified agent); the tracker itself answers for
    /// the enabled flag, active suspensions, and the window arithmetic.
    pub fn record(
        &self,
        event: &AdminEvent,
        actor_id: &str,
        settings: &ProtectionSettings,
        exempt: Option<IgnoreReason>,
        now: i64,
    ) -> RecordOutcome {
        if !settings.enabled {
            self.events_ignored.fetch_add(1, Ordering::Relaxed);
            return RecordOutcome::Ignored(IgnoreReason::Disabled);
        }
        if self.is_suspended(&event.workspace_id, actor_id, now) {
            self.events_ignored.fetch_add(1, Ordering::Relaxed);
            return RecordOutcome::Ignored(IgnoreReason::Suspended);
        }
        if let Some(reason) = exempt {
            self.events_ignored.fetch_add(1, Ordering::Relaxed);
            return RecordOutcome::Ignored(reason);
        }

        let key = CounterKey {
            workspace: event.workspace_id.clone(),
            actor: actor_id.to_string(),
            kind: event.kind,
        };
        let window = settings.threshold_window_secs;
        let threshold = settings.threshold_count;

        let count = self.counters.with_mut(&key, |shard| {
            let counter = shard.entry(key.clone()).or_insert_with(|| ActionCounter {
                count: 0,
                window_started_at: now,
                window_secs: window,
                recent_events: Vec::new(),
            });
            if now - counter.window_started_at >= window {
                // The previous window expired without triggering; this
                // event starts a fresh one.
                counter.count = 0;
                counter.window_started_at = now;
                counter.recent_events.clear();
            }
            counter.window_secs = window;
            counter.count += 1;
            if counter.recent_events.len() < MAX_RECENT_EVENTS {
                counter.recent_events.push((now, event.resource_label.clone()));
            }
            let count = counter.count;
            if count >= threshold {
                // Delete the counter so any future activity restarts the
                // window cleanly.
                shard.remove(&key);
            }
            count
        });

        if count >= threshold {
            self.triggers.fetch_add(1, Ordering::Relaxed);
            let cooldown = self.ledger.cooldown_for(actor_id, now);
            self.suspensions
                .insert((event.workspace_id.clone(), actor_id.to_string()), now + cooldown);
            warn!(
                workspace = %event.workspace_id,
                actor = %actor_id,
                kind = ?event.kind,
                count = count,
                cooldown_secs = cooldown,
                "Burst threshold reached"
            );
            RecordOutcome::Triggered(count)
        } else {
            self.events_counted.fetch_add(1, Ordering::Relaxed);
            debug!(workspace = %event.workspace_id, actor = %actor_id, kind = ?event.kind, count = count, "Event counted");
            RecordOutcome::Counted(count)
        }
    }

    /// Whether the actor is serving a cooldown in this workspace. Expired
    /// suspensions are evicted on read.
    pub fn is_suspended(&self, workspace: &str, actor: &str, now: i64) -> bool {
        let key = (workspace.to_string(), actor.to_string());
        self.suspensions.with_mut(&key, |shard| match shard.get(&key) {
            Some(&until) if until > now => true,
            Some(_) => {
                shard.remove(&key);
                false
            }
            None => false,
        })
    }

    /// Safety-net reaper pass: evict stale counters and expired
    /// suspensions. Idempotent; safe to run on any cadence.
    pub fn sweep(&self, now: i64) -> (usize, usize) {
        let mut counters_dropped = 0;
        let max_age = self.counter_max_age_secs;
        self.counters.retain_all(|_, c| {
            // A counter is stale only once both its own window and the
            // configured max age have passed; a long-window counter must
            // survive until its window closes.
            if now - c.window_started_at < c.window_secs.max(max_age) {
                true
            } else {
                counters_dropped += 1;
                false
            }
        });
        let mut suspensions_dropped = 0;
        self.suspensions.retain_all(|_, &mut until| {
            if until > now {
                true
            } else {
                suspensions_dropped += 1;
                false
            }
        });
        if counters_dropped + suspensions_dropped > 0 {
            debug!(counters = counters_dropped, suspensions = suspensions_dropped, "Sweep evicted stale entries");
        }
        (counters_dropped, suspensions_dropped)
    }

    pub fn active_counters(&self) -> usize {
        self.counters.len()
    }

    pub fn active_suspensions(&self) -> usize {
        self.suspensions.len()
    }

    pub fn triggers(&self) -> u64 {
        self.triggers.load(Ordering::Relaxed)
    }

    pub fn events_counted(&self) -> u64 {
        self.events_counted.load(Ordering::Relaxed)
    }

    pub fn events_ignored(&self) -> u64 {
        self.events_ignored.load(Ordering::Relaxed)
    }
}
