//! Snapshot Sampler — correlation-free structural velocity signal.
//!
//! Periodically samples the bare structure of a workspace (which containers
//! and roles exist) and compares consecutive samples. A workspace losing
//! containers or gaining roles faster than the sensitivity threshold is
//! reported as a burst. The signal carries no actor identity and never
//! sanctions — it exists as defense in depth for when audit-trail
//! correlation is delayed, missing, or rate-limited.

use crate::types::{BurstVerdict, GuardAlert, Severity};
use parking_lot::RwLock;
use rampart_core::providers::{NotificationSink, StructureProvider};
use rampart_core::types::ContainerKind;
use rampart_core::{GuardConfig, RampartResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

const MAX_ALERTS: usize = 5_000;

/// One bare structural sample: existence only, no permissions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StructuralSnapshot {
    pub containers: Vec<(String, String, ContainerKind)>,
    pub roles: Vec<(String, String)>,
    pub taken_at: i64,
}

#[derive(Default)]
struct SnapshotPair {
    previous: Option<StructuralSnapshot>,
    current: Option<StructuralSnapshot>,
}

pub struct SnapshotSampler {
    structure: Arc<dyn StructureProvider>,
    notify: Option<Arc<dyn NotificationSink>>,
    retained: RwLock<HashMap<String, SnapshotPair>>,
    watchers: RwLock<HashMap<String, Arc<AtomicBool>>>,
    period_secs: u64,
    rate_per_sec: f64,
    samples_taken: AtomicU64,
    bursts_detected: AtomicU64,
    alerts: RwLock<Vec<GuardAlert>>,
}

impl SnapshotSampler {
    pub fn new(
        structure: Arc<dyn StructureProvider>,
        notify: Option<Arc<dyn NotificationSink>>,
        config: &GuardConfig,
    ) -> Self {
        Self {
            structure,
            notify,
            retained: RwLock::new(HashMap::new()),
            watchers: RwLock::new(HashMap::new()),
            period_secs: config.sampler_period_secs,
            rate_per_sec: config.sampler_rate_per_sec,
            samples_taken: AtomicU64::new(0),
            bursts_detected: AtomicU64::new(0),
            alerts: RwLock::new(Vec::new()),
        }
    }

    /// Take a fresh sample for `workspace` and rotate it into the retained
    /// pair (current becomes previous).
    pub fn sample(&self, workspace: &str, now: i64) -> RampartResult<StructuralSnapshot> {
        let containers = self
            .structure
            .list_containers(workspace)?
            .into_iter()
            .map(|c| (c.id, c.name, c.kind))
            .collect();
        let roles = self
            .structure
            .list_roles(workspace)?
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();
        let snapshot = StructuralSnapshot { containers, roles, taken_at: now };
        self.samples_taken.fetch_add(1, Ordering::Relaxed);

        let mut retained = self.retained.write();
        let pair = retained.entry(workspace.to_string()).or_default();
        pair.previous = pair.current.take();
        pair.current = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Compare the retained pair for `workspace`. `None` until two samples
    /// exist.
    pub fn detect_burst(&self, workspace: &str) -> BurstVerdict {
        let retained = self.retained.read();
        let pair = match retained.get(workspace) {
            Some(p) => p,
            None => return BurstVerdict::None,
        };
        let (prev, cur) = match (&pair.previous, &pair.current) {
            (Some(p), Some(c)) => (p, c),
            _ => return BurstVerdict::None,
        };
        let elapsed = (cur.taken_at - prev.taken_at).max(1);

        let cur_container_ids: HashSet<&str> =
            cur.containers.iter().map(|(id, _, _)| id.as_str()).collect();
        let deleted_containers: Vec<String> = prev
            .containers
            .iter()
            .filter(|(id, _, _)| !cur_container_ids.contains(id.as_str()))
            .map(|(_, name, _)| name.clone())
            .collect();

        let prev_role_ids: HashSet<&str> = prev.roles.iter().map(|(id, _)| id.as_str()).collect();
        let created_roles: Vec<String> = cur
            .roles
            .iter()
            .filter(|(id, _)| !prev_role_ids.contains(id.as_str()))
            .map(|(_, name)| name.clone())
            .collect();

        let delete_rate = deleted_containers.len() as f64 / elapsed as f64;
        let create_rate = created_roles.len() as f64 / elapsed as f64;

        if delete_rate > self.rate_per_sec || create_rate > self.rate_per_sec {
            self.bursts_detected.fetch_add(1, Ordering::Relaxed);
            warn!(
                workspace = %workspace,
                deleted = deleted_containers.len(),
                created = created_roles.len(),
                delete_rate = delete_rate,
                create_rate = create_rate,
                "Structural burst observed without attribution"
            );
            BurstVerdict::Burst {
                deleted_containers,
                created_roles,
                delete_rate,
                create_rate,
                elapsed_secs: elapsed,
            }
        } else {
            BurstVerdict::None
        }
    }

    /// One sampling tick: sample then compare. Alerting and notification on
    /// a burst are best-effort.
    pub fn tick(&self, workspace: &str, now: i64) -> RampartResult<BurstVerdict> {
        self.sample(workspace, now)?;
        let verdict = self.detect_burst(workspace);
        if let BurstVerdict::Burst { ref deleted_containers, ref created_roles, .. } = verdict {
            self.add_alert(
                now,
                Severity::High,
                "Structural burst",
                &format!(
                    "{} containers deleted, {} roles created between samples",
                    deleted_containers.len(),
                    created_roles.len()
                ),
            );
            if let Some(ref sink) = self.notify {
                if let Err(e) = sink.post(
                    workspace,
                    &format!(
                        "Rapid structural change: {} containers deleted, {} roles created",
                        deleted_containers.len(),
                        created_roles.len()
                    ),
                ) {
                    warn!(workspace = %workspace, error = %e, "Burst notification failed");
                }
            }
        }
        Ok(verdict)
    }

    /// Start a background sampling loop for `workspace`. One lightweight
    /// thread per watched workspace; a slow platform call makes the loop run
    /// late, never queue ticks.
    pub fn watch(self: &Arc<Self>, workspace: &str) {
        let mut watchers = self.watchers.write();
        if watchers.contains_key(workspace) {
            return;
        }
        let running = Arc::new(AtomicBool::new(true));
        watchers.insert(workspace.to_string(), Arc::clone(&running));
        // Weak so a dropped sampler ends its watchers instead of the
        // watcher thread pinning the sampler alive.
        let sampler = Arc::downgrade(self);
        let ws = workspace.to_string();
        let period = std::time::Duration::from_secs(self.period_secs);
        info!(workspace = %ws, period_secs = self.period_secs, "Sampler watch started");
        std::thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                let sampler = match sampler.upgrade() {
                    Some(s) => s,
                    None => break,
                };
                let now = chrono::Utc::now().timestamp();
                if let Err(e) = sampler.tick(&ws, now) {
                    warn!(workspace = %ws, error = %e, "Sample skipped");
                }
                drop(sampler);
                std::thread::sleep(period);
            }
            info!(workspace = %ws, "Sampler watch stopped");
        });
    }

    pub fn unwatch(&self, workspace: &str) {
        if let Some(flag) = self.watchers.write().remove(workspace) {
            flag.store(false, Ordering::Relaxed);
        }
    }

    pub fn unwatch_all(&self) {
        for (_, flag) in self.watchers.write().drain() {
            flag.store(false, Ordering::Relaxed);
        }
    }

    fn add_alert(&self, ts: i64, severity: Severity, title: &str, details: &str) {
        let mut alerts = self.alerts.write();
        if alerts.len() >= MAX_ALERTS {
            alerts.remove(0);
        }
        alerts.push(GuardAlert {
            timestamp: ts,
            severity,
            component: "snapshot_sampler".into(),
            title: title.into(),
            details: details.into(),
        });
    }

    pub fn samples_taken(&self) -> u64 {
        self.samples_taken.load(Ordering::Relaxed)
    }

    pub fn bursts_detected(&self) -> u64 {
        self.bursts_detected.load(Ordering::Relaxed)
    }

    pub fn alerts(&self) -> Vec<GuardAlert> {
        self.alerts.read().clone()
    }
}

impl Drop for SnapshotSampler {
    fn drop(&mut self) {
        for flag in self.watchers.read().values() {
            flag.store(false, Ordering::Relaxed);
        }
    }
}
