//! Protection Orchestrator — wires detection to response.
//!
//! Per administrative event the machine runs
//! `Idle → ExceptionCheck → RateTrack → (Ignored | Counted | Triggered)`.
//! On a trigger the actor is sanctioned per the workspace's response policy,
//! the attempt lands in the escalation ledger, operators are notified, and
//! the restore engine reconciles the workspace. Sanctioning and notification
//! are best-effort; structure recovery is the priority action and always
//! gets its attempt.

use crate::escalation::{schedule_cooldown, EscalationLedger};
use crate::principal_cache::PrincipalInfoCache;
use crate::rate_tracker::RateTracker;
use crate::settings::SettingsProvider;
use crate::types::{EventDisposition, GuardAlert, IgnoreReason, RecordOutcome, RestoreSummary, Severity};
use parking_lot::RwLock;
use rampart_backup::types::RestoreOutcome;
use rampart_backup::RestoreEngine;
use rampart_core::providers::{AttributionProvider, DurableStore, NotificationSink, SanctionProvider};
use rampart_core::types::{AdminEvent, ProtectionSettings, ResponsePolicy};
use rampart_core::{GuardConfig, RampartResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

const MAX_ALERTS: usize = 10_000;

pub struct ProtectionOrchestrator {
    settings: SettingsProvider,
    principals: PrincipalInfoCache,
    tracker: Arc<RateTracker>,
    ledger: Arc<EscalationLedger>,
    durable: Arc<dyn DurableStore>,
    sanctions: Arc<dyn SanctionProvider>,
    attribution: Arc<dyn AttributionProvider>,
    notify: Arc<dyn NotificationSink>,
    restore: Arc<RestoreEngine>,
    config: GuardConfig,
    reaper_running: Arc<AtomicBool>,
    alerts: RwLock<Vec<GuardAlert>>,
    events_seen: AtomicU64,
    triggers: AtomicU64,
    sanctions_failed: AtomicU64,
    restores_run: AtomicU64,
}

impl ProtectionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        durable: Arc<dyn DurableStore>,
        identity: Arc<dyn rampart_core::providers::IdentityProvider>,
        sanctions: Arc<dyn SanctionProvider>,
        attribution: Arc<dyn AttributionProvider>,
        notify: Arc<dyn NotificationSink>,
        restore: Arc<RestoreEngine>,
        config: GuardConfig,
    ) -> Self {
        let ledger = Arc::new(EscalationLedger::new());
        let tracker = Arc::new(RateTracker::new(Arc::clone(&ledger), config.counter_max_age_secs));
        Self {
            settings: SettingsProvider::new(Arc::clone(&durable), config.settings_ttl_secs),
            principals: PrincipalInfoCache::new(identity, config.principal_ttl_secs),
            tracker,
            ledger,
            durable,
            sanctions,
            attribution,
            notify,
            restore,
            config,
            reaper_running: Arc::new(AtomicBool::new(false)),
            alerts: RwLock::new(Vec::new()),
            events_seen: AtomicU64::new(0),
            triggers: AtomicU64::new(0),
            sanctions_failed: AtomicU64::new(0),
            restores_run: AtomicU64::new(0),
        }
    }

    /// Process one administrative event end to end.
    pub fn handle_event(&self, event: &AdminEvent) -> RampartResult<EventDisposition> {
        self.events_seen.fetch_add(1, Ordering::Relaxed);
        let now = event.timestamp;
        let workspace = event.workspace_id.as_str();

        let settings = self.settings.settings_for(workspace, now)?;
        if !settings.enabled {
            return Ok(EventDisposition::Ignored(IgnoreReason::Disabled));
        }

        let actor = match self.resolve_actor(event) {
            Some(actor) => actor,
            None => {
                warn!(workspace = %workspace, kind = ?event.kind, "Structural change without attribution");
                return Ok(EventDisposition::Ignored(IgnoreReason::NoActor));
            }
        };

        let exempt = self.exception_for(workspace, &actor, &settings, now)?;
        match self.tracker.record(event, &actor, &settings, exempt, now) {
            RecordOutcome::Ignored(reason) => Ok(EventDisposition::Ignored(reason)),
            RecordOutcome::Counted(count) => Ok(EventDisposition::Counted(count)),
            RecordOutcome::Triggered(count) => {
                Ok(self.respond(event, &actor, &settings, count, now))
            }
        }
    }

    fn resolve_actor(&self, event: &AdminEvent) -> Option<String> {
        if let Some(ref actor) = event.actor_id {
            return Some(actor.clone());
        }
        match self.attribution.actor_for(&event.workspace_id, event.kind, &event.resource_label) {
            Ok(actor) => actor,
            Err(e) => {
                warn!(workspace = %event.workspace_id, error = %e, "Attribution lookup failed");
                None
            }
        }
    }

    fn exception_for(
        &self,
        workspace: &str,
        actor: &str,
        settings: &ProtectionSettings,
        now: i64,
    ) -> RampartResult<Option<IgnoreReason>> {
        if settings.ignore_trusted_principals && self.durable.is_allow_listed(workspace, actor)? {
            return Ok(Some(IgnoreReason::AllowListed));
        }
        if settings.ignore_verified_agents {
            // Identity failures fall toward counting, never toward exemption.
            match self.principals.is_verified_agent(actor, now) {
                Ok(true) => return Ok(Some(IgnoreReason::VerifiedAgent)),
                Ok(false) => {}
                Err(e) => {
                    warn!(actor = %actor, error = %e, "Identity lookup failed; treating as unverified");
                }
            }
        }
        Ok(None)
    }

    /// Triggered path: sanction, alert, restore — in that order, with the
    /// restore attempted regardless of earlier failures.
    fn respond(
        &self,
        event: &AdminEvent,
        actor: &str,
        settings: &ProtectionSettings,
        count: u32,
        now: i64,
    ) -> EventDisposition {
        self.triggers.fetch_add(1, Ordering::Relaxed);
        let workspace = event.workspace_id.as_str();
        let attempts = self.ledger.record_trigger(actor, now);
        let cooldown_secs = schedule_cooldown(attempts.saturating_sub(1));
        let permanent = attempts >= 3;

        info!(
            workspace = %workspace,
            actor = %actor,
            kind = ?event.kind,
            count = count,
            attempts_24h = attempts,
            permanent = permanent,
            "Mass-destruction trigger"
        );
        self.add_alert(
            now,
            if permanent { Severity::Critical } else { Severity::High },
            "Mass-destruction trigger",
            &format!(
                "actor={} kind={:?} count={} attempts_24h={}",
                actor, event.kind, count, attempts
            ),
        );

        let mut sanctioned = false;
        if settings.response_policy == ResponsePolicy::Ban {
            let reason = if permanent {
                format!("Repeated mass-destruction ({} attempts in 24h)", attempts)
            } else {
                format!("Mass-destruction burst ({} {:?} events)", count, event.kind)
            };
            match self.sanctions.ban_principal(workspace, actor, &reason, self.config.purge_window_secs) {
                Ok(()) => sanctioned = true,
                Err(e) => {
                    self.sanctions_failed.fetch_add(1, Ordering::Relaxed);
                    warn!(workspace = %workspace, actor = %actor, error = %e, "Sanction failed; continuing to restore");
                }
            }
        }

        if let Err(e) = self.notify.post(
            workspace,
            &format!(
                "Mass-destruction attempt by {}: {} {:?} events. Sanctioned: {}. Restoring structure.",
                actor, count, event.kind, sanctioned
            ),
        ) {
            warn!(workspace = %workspace, error = %e, "Trigger notification failed");
        }

        let restore = if settings.response_policy == ResponsePolicy::NotifyOnly {
            RestoreSummary::Skipped
        } else {
            self.restores_run.fetch_add(1, Ordering::Relaxed);
            match self.restore.restore(workspace, now) {
                Ok(RestoreOutcome::Completed(_)) => RestoreSummary::Completed,
                Ok(RestoreOutcome::InProgress) => RestoreSummary::InProgress,
                Ok(RestoreOutcome::NoData) => RestoreSummary::NoData,
                Ok(RestoreOutcome::FailedAllBackups) => RestoreSummary::FailedAllBackups,
                Err(e) => {
                    error!(workspace = %workspace, error = %e, "Restore errored");
                    RestoreSummary::Errored
                }
            }
        };

        EventDisposition::Triggered {
            count,
            attempts_24h: attempts,
            cooldown_secs,
            sanctioned,
            restore,
        }
    }

    // ── TTL cleanup ─────────────────────────────────────────────────────────

    /// One reaper pass over all expiring structures. Idempotent.
    pub fn sweep(&self, now: i64) {
        let (counters, suspensions) = self.tracker.sweep(now);
        let ledgers = self.ledger.sweep(now);
        let settings = self.settings.prune_expired(now);
        let principals = self.principals.prune_expired(now);
        if counters + suspensions + ledgers + settings + principals > 0 {
            info!(
                counters = counters,
                suspensions = suspensions,
                ledgers = ledgers,
                settings = settings,
                principals = principals,
                "Reaper pass evicted stale entries"
            );
        }
    }

    /// Start the periodic background reaper. The per-entry lazy expiry is
    /// the common path; this is the safety net against keys that never see
    /// another touch.
    pub fn start_reaper(self: &Arc<Self>) {
        if self.reaper_running.swap(true, Ordering::SeqCst) {
            return;
        }
        // Weak so the reaper thread never pins the orchestrator alive.
        let orchestrator = Arc::downgrade(self);
        let running = Arc::clone(&self.reaper_running);
        let interval = std::time::Duration::from_secs(self.config.sweep_interval_secs);
        info!(interval_secs = self.config.sweep_interval_secs, "Reaper started");
        std::thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                match orchestrator.upgrade() {
                    Some(o) => o.sweep(chrono::Utc::now().timestamp()),
                    None => break,
                }
            }
            info!("Reaper stopped");
        });
    }

    pub fn stop_reaper(&self) {
        self.reaper_running.store(false, Ordering::SeqCst);
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn tracker(&self) -> &RateTracker {
        &self.tracker
    }

    pub fn ledger(&self) -> &EscalationLedger {
        &self.ledger
    }

    pub fn settings_provider(&self) -> &SettingsProvider {
        &self.settings
    }

    fn add_alert(&self, ts: i64, severity: Severity, title: &str, details: &str) {
        let mut alerts = self.alerts.write();
        if alerts.len() >= MAX_ALERTS {
            alerts.remove(0);
        }
        alerts.push(GuardAlert {
            timestamp: ts,
            severity,
            component: "protection_orchestrator".into(),
            title: title.into(),
            details: details.into(),
        });
    }

    pub fn alerts(&self) -> Vec<GuardAlert> {
        self.alerts.read().clone()
    }

    pub fn events_seen(&self) -> u64 {
        self.events_seen.load(Ordering::Relaxed)
    }

    pub fn triggers(&self) -> u64 {
        self.triggers.load(Ordering::Relaxed)
    }

    pub fn sanctions_failed(&self) -> u64 {
        self.sanctions_failed.load(Ordering::Relaxed)
    }

    pub fn restores_run(&self) -> u64 {
        self.restores_run.load(Ordering::Relaxed)
    }
}

impl Drop for ProtectionOrchestrator {
    fn drop(&mut self) {
        self.reaper_running.store(false, Ordering::Relaxed);
    }
}
