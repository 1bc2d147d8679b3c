//! Backup Store — captures, validates, and retains structural snapshots.
//!
//! One capture per workspace at a time (single-flight); a validated version
//! is prepended to the workspace's bounded history and the whole history is
//! persisted atomically as a single JSON blob. A version that fails
//! validation is discarded without touching the stored history.

use crate::types::{BackupAlert, BackupHistory, BackupMeta, BackupOutcome, BackupVersion, Severity};
use parking_lot::RwLock;
use rampart_core::compression;
use rampart_core::providers::{DurableStore, StructureProvider};
use rampart_core::single_flight::SingleFlight;
use rampart_core::{BackupConfig, RampartError, RampartResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

const MAX_ALERTS: usize = 5_000;
const MAX_AUDIT: usize = 10_000;

/// Validation rules shared by capture and restore candidate selection.
pub fn validate_version(version: &BackupVersion, config: &BackupConfig) -> RampartResult<()> {
    if version.containers.is_empty() && version.roles.is_empty() {
        return Err(RampartError::Validation("backup has neither containers nor roles".into()));
    }
    if version.taken_at <= 0 {
        return Err(RampartError::Validation(format!(
            "backup carries invalid timestamp {}",
            version.taken_at
        )));
    }
    if !version.containers.is_empty()
        && !version
            .containers
            .iter()
            .any(|c| config.postable_kinds.contains(&c.kind))
    {
        return Err(RampartError::Validation("backup has containers but none are postable".into()));
    }
    Ok(())
}

pub struct BackupStore {
    structure: Arc<dyn StructureProvider>,
    durable: Arc<dyn DurableStore>,
    config: BackupConfig,
    in_flight: SingleFlight,
    compressed_audit: RwLock<Vec<Vec<u8>>>,
    alerts: RwLock<Vec<BackupAlert>>,
    captures: AtomicU64,
    rejected: AtomicU64,
}

impl BackupStore {
    pub fn new(
        structure: Arc<dyn StructureProvider>,
        durable: Arc<dyn DurableStore>,
        config: BackupConfig,
    ) -> Self {
        Self {
            structure,
            durable,
            config,
            in_flight: SingleFlight::new(),
            compressed_audit: RwLock::new(Vec::new()),
            alerts: RwLock::new(Vec::new()),
            captures: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Capture the live structure of `workspace` into a new backup version.
    pub fn create_backup(
        &self,
        workspace: &str,
        workspace_name: &str,
        now: i64,
    ) -> RampartResult<BackupOutcome> {
        let _guard = match self.in_flight.begin(workspace) {
            Some(g) => g,
            None => {
                info!(workspace = %workspace, "Backup already in progress");
                return Ok(BackupOutcome::InProgress);
            }
        };

        let containers = self.structure.list_containers(workspace)?;
        // Managed roles and the everyone pseudo-role are platform-owned;
        // only editable roles are worth restoring.
        let roles: Vec<_> = self
            .structure
            .list_roles(workspace)?
            .into_iter()
            .filter(|r| r.is_editable())
            .collect();

        let version = BackupVersion {
            container_count: containers.len(),
            role_count: roles.len(),
            containers,
            roles,
            taken_at: now,
            workspace_name: workspace_name.to_string(),
        };

        if let Err(e) = validate_version(&version, &self.config) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(workspace = %workspace, error = %e, "Backup candidate rejected");
            self.add_alert(now, Severity::Medium, "Backup rejected", &e.to_string());
            return Err(e);
        }

        let mut history = self.history(workspace)?;
        history.insert(0, version.clone());
        history.truncate(self.config.max_versions);
        let blob = serde_json::to_vec(&history)?;
        self.durable.store_backup_history(workspace, &blob)?;

        self.captures.fetch_add(1, Ordering::Relaxed);
        self.audit(&format!(
            "{{\"ws\":\"{}\",\"containers\":{},\"roles\":{},\"ts\":{}}}",
            workspace, version.container_count, version.role_count, now
        ));
        info!(
            workspace = %workspace,
            containers = version.container_count,
            roles = version.role_count,
            depth = history.len(),
            "Backup captured"
        );
        self.add_alert(
            now,
            Severity::Low,
            "Backup captured",
            &format!("{} containers, {} roles", version.container_count, version.role_count),
        );

        Ok(BackupOutcome::Completed(BackupMeta {
            taken_at: now,
            container_count: version.container_count,
            role_count: version.role_count,
            history_depth: history.len(),
        }))
    }

    /// Load the stored history for `workspace`, newest first. Missing row
    /// means an empty history; a read or decode failure is an error.
    pub fn history(&self, workspace: &str) -> RampartResult<BackupHistory> {
        match self.durable.load_backup_history(workspace)? {
            Some(blob) => Ok(serde_json::from_slice(&blob)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    fn audit(&self, line: &str) {
        let compressed = compression::compress_lz4(line.as_bytes());
        let mut audit = self.compressed_audit.write();
        if audit.len() >= MAX_AUDIT {
            let half = audit.len() / 2;
            audit.drain(..half);
        }
        audit.push(compressed);
    }

    fn add_alert(&self, ts: i64, severity: Severity, title: &str, details: &str) {
        let mut alerts = self.alerts.write();
        if alerts.len() >= MAX_ALERTS {
            alerts.remove(0);
        }
        alerts.push(BackupAlert {
            timestamp: ts,
            severity,
            component: "backup_store".into(),
            title: title.into(),
            details: details.into(),
        });
    }

    pub fn captures(&self) -> u64 {
        self.captures.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn alerts(&self) -> Vec<BackupAlert> {
        self.alerts.read().clone()
    }

    pub fn audit_len(&self) -> usize {
        self.compressed_audit.read().len()
    }
}
