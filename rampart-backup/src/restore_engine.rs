//! Restore Engine — reconcile live structure to the newest valid backup.
//!
//! Versions are tried newest to oldest; the first one that validates and
//! applies wins, and older versions are never touched. Application order is
//! a correctness invariant: extraneous roles go first, then extraneous
//! containers, then missing roles, then missing containers (categories
//! before their children).
//!
//! Matching is (name, kind) by policy, not id: ids do not survive
//! destroy/recreate cycles on the platform. Duplicate-named objects can
//! therefore produce false "already exists" matches; that limitation is
//! accepted and documented here rather than hidden.

use crate::backup_store::{validate_version, BackupStore};
use crate::types::{BackupAlert, BackupVersion, RestoreOutcome, RestoreStats, Severity};
use parking_lot::RwLock;
use rampart_core::compression;
use rampart_core::providers::StructureProvider;
use rampart_core::single_flight::SingleFlight;
use rampart_core::types::{ContainerKind, ContainerRecord, PermissionGrant, PrincipalKind, RoleRecord};
use rampart_core::{BackupConfig, RampartResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

const MAX_ALERTS: usize = 5_000;
const MAX_AUDIT: usize = 10_000;

pub struct RestoreEngine {
    structure: Arc<dyn StructureProvider>,
    store: Arc<BackupStore>,
    config: BackupConfig,
    in_flight: SingleFlight,
    compressed_audit: RwLock<Vec<Vec<u8>>>,
    alerts: RwLock<Vec<BackupAlert>>,
    restores_completed: AtomicU64,
    restores_exhausted: AtomicU64,
    versions_skipped: AtomicU64,
}

impl RestoreEngine {
    pub fn new(
        structure: Arc<dyn StructureProvider>,
        store: Arc<BackupStore>,
        config: BackupConfig,
    ) -> Self {
        Self {
            structure,
            store,
            config,
            in_flight: SingleFlight::new(),
            compressed_audit: RwLock::new(Vec::new()),
            alerts: RwLock::new(Vec::new()),
            restores_completed: AtomicU64::new(0),
            restores_exhausted: AtomicU64::new(0),
            versions_skipped: AtomicU64::new(0),
        }
    }

    /// Reconcile `workspace` to its most recent valid backup version.
    pub fn restore(&self, workspace: &str, now: i64) -> RampartResult<RestoreOutcome> {
        let _guard = match self.in_flight.begin(workspace) {
            Some(g) => g,
            None => {
                info!(workspace = %workspace, "Restore already in progress");
                return Ok(RestoreOutcome::InProgress);
            }
        };

        let history = self.store.history(workspace)?;
        if history.is_empty() {
            info!(workspace = %workspace, "No backup history to restore from");
            return Ok(RestoreOutcome::NoData);
        }

        for (index, version) in history.iter().enumerate() {
            if let Err(e) = validate_version(version, &self.config) {
                self.versions_skipped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    workspace = %workspace,
                    version_index = index,
                    taken_at = version.taken_at,
                    error = %e,
                    "Backup version failed re-validation, trying older"
                );
                continue;
            }
            match self.apply(workspace, version) {
                Ok(stats) => {
                    self.restores_completed.fetch_add(1, Ordering::Relaxed);
                    info!(
                        workspace = %workspace,
                        version_index = index,
                        taken_at = version.taken_at,
                        roles_deleted = stats.roles_deleted,
                        containers_deleted = stats.containers_deleted,
                        roles_created = stats.roles_created,
                        containers_created = stats.containers_created,
                        "Restore completed"
                    );
                    self.audit(&format!(
                        "{{\"ws\":\"{}\",\"version_ts\":{},\"ts\":{},\"failures\":{}}}",
                        workspace, version.taken_at, now, stats.object_failures
                    ));
                    self.add_alert(
                        now,
                        Severity::High,
                        "Workspace restored",
                        &format!(
                            "version from {} applied: +{} containers, +{} roles, {} object failures",
                            version.taken_at,
                            stats.containers_created,
                            stats.roles_created,
                            stats.object_failures
                        ),
                    );
                    return Ok(RestoreOutcome::Completed(stats));
                }
                Err(e) => {
                    self.versions_skipped.fetch_add(1, Ordering::Relaxed);
                    error!(
                        workspace = %workspace,
                        version_index = index,
                        error = %e,
                        "Backup version failed to apply, trying older"
                    );
                }
            }
        }

        self.restores_exhausted.fetch_add(1, Ordering::Relaxed);
        error!(workspace = %workspace, versions = history.len(), "Every backup version failed");
        self.add_alert(
            now,
            Severity::Critical,
            "Restore exhausted",
            &format!("all {} retained versions failed; manual intervention required", history.len()),
        );
        Ok(RestoreOutcome::FailedAllBackups)
    }

    /// Apply one version. Enumeration failures abort the candidate; single
    /// object create/delete failures are logged, counted, and skipped.
    fn apply(&self, workspace: &str, version: &BackupVersion) -> RampartResult<RestoreStats> {
        let mut stats = RestoreStats { version_taken_at: version.taken_at, ..Default::default() };

        let backup_role_names: HashSet<&str> =
            version.roles.iter().map(|r| r.name.as_str()).collect();
        let backup_container_keys: HashSet<(&str, ContainerKind)> = version
            .containers
            .iter()
            .map(|c| (c.name.as_str(), c.kind))
            .collect();

        // 1. Delete extraneous editable roles (attacker-created or renamed).
        let live_roles = self.structure.list_roles(workspace)?;
        for role in live_roles.iter().filter(|r| r.is_editable()) {
            if !backup_role_names.contains(role.name.as_str()) {
                if let Err(e) = self.structure.delete_role(workspace, &role.id) {
                    warn!(workspace = %workspace, role = %role.name, error = %e, "Role deletion failed");
                    stats.object_failures += 1;
                } else {
                    stats.roles_deleted += 1;
                }
            }
        }

        // 2. Delete extraneous containers.
        let live_containers = self.structure.list_containers(workspace)?;
        for container in &live_containers {
            if !backup_container_keys.contains(&(container.name.as_str(), container.kind)) {
                if let Err(e) = self.structure.delete_container(workspace, &container.id) {
                    warn!(workspace = %workspace, container = %container.name, error = %e, "Container deletion failed");
                    stats.object_failures += 1;
                } else {
                    stats.containers_deleted += 1;
                }
            }
        }

        // 3. Recreate missing roles, highest position first so relative
        // hierarchy is approximated. Exact positions cannot be guaranteed:
        // the platform assigns positions on creation.
        let live_role_names: HashSet<String> =
            live_roles.iter().map(|r| r.name.clone()).collect();
        let mut to_create: Vec<&RoleRecord> = version
            .roles
            .iter()
            .filter(|r| !live_role_names.contains(&r.name))
            .collect();
        to_create.sort_by(|a, b| b.position.cmp(&a.position));
        for role in to_create {
            if let Err(e) = self.structure.create_role(workspace, role) {
                warn!(workspace = %workspace, role = %role.name, error = %e, "Role creation failed");
                stats.object_failures += 1;
            } else {
                stats.roles_created += 1;
            }
        }

        // Role grants resolve against the post-recreation live set.
        let roles_after = self.structure.list_roles(workspace)?;
        let role_ids_by_name: HashMap<&str, &str> = roles_after
            .iter()
            .map(|r| (r.name.as_str(), r.id.as_str()))
            .collect();
        let everyone_id = roles_after.iter().find(|r| r.everyone).map(|r| r.id.clone());

        // 4. Recreate missing containers: categories first so children can
        // resolve their parents, then the rest with pacing between creates.
        let surviving_keys: HashSet<(String, ContainerKind)> = live_containers
            .iter()
            .filter(|c| backup_container_keys.contains(&(c.name.as_str(), c.kind)))
            .map(|c| (c.name.clone(), c.kind))
            .collect();
        let mut category_ids_by_name: HashMap<String, String> = live_containers
            .iter()
            .filter(|c| c.kind.is_category())
            .map(|c| (c.name.clone(), c.id.clone()))
            .collect();

        let missing = |c: &ContainerRecord| !surviving_keys.contains(&(c.name.clone(), c.kind));

        for category in version
            .containers
            .iter()
            .filter(|c| c.kind.is_category() && missing(c))
        {
            let (spec, dropped) =
                remap_grants(category, &role_ids_by_name, everyone_id.as_deref(), None);
            stats.grants_dropped += dropped;
            match self.structure.create_container(workspace, &spec) {
                Ok(new_id) => {
                    category_ids_by_name.insert(category.name.clone(), new_id);
                    stats.containers_created += 1;
                }
                Err(e) => {
                    warn!(workspace = %workspace, container = %category.name, error = %e, "Category creation failed");
                    stats.object_failures += 1;
                }
            }
        }

        let pace = std::time::Duration::from_millis(self.config.create_pace_ms);
        let mut first = true;
        for container in version
            .containers
            .iter()
            .filter(|c| !c.kind.is_category() && missing(c))
        {
            // Pacing against platform rate limits.
            if !first && !pace.is_zero() {
                std::thread::sleep(pace);
            }
            first = false;

            let parent_id = container
                .parent_name
                .as_deref()
                .and_then(|name| category_ids_by_name.get(name).cloned());
            let (spec, dropped) =
                remap_grants(container, &role_ids_by_name, everyone_id.as_deref(), parent_id);
            stats.grants_dropped += dropped;
            match self.structure.create_container(workspace, &spec) {
                Ok(_) => stats.containers_created += 1,
                Err(e) => {
                    warn!(workspace = %workspace, container = %container.name, error = %e, "Container creation failed");
                    stats.object_failures += 1;
                }
            }
        }

        Ok(stats)
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
            component: "restore_engine".into(),
            title: title.into(),
            details: details.into(),
        });
    }

    pub fn restores_completed(&self) -> u64 {
        self.restores_completed.load(Ordering::Relaxed)
    }

    pub fn restores_exhausted(&self) -> u64 {
        self.restores_exhausted.load(Ordering::Relaxed)
    }

    pub fn versions_skipped(&self) -> u64 {
        self.versions_skipped.load(Ordering::Relaxed)
    }

    pub fn alerts(&self) -> Vec<BackupAlert> {
        self.alerts.read().clone()
    }
}

/// Re-map a stored container's grants onto live principal ids. Role grants
/// resolve by name and are dropped when no live role matches; the everyone
/// pseudo-role resolves to the live everyone id by convention; member grants
/// pass through unchanged (member ids are stable).
fn remap_grants(
    stored: &ContainerRecord,
    role_ids_by_name: &HashMap<&str, &str>,
    everyone_id: Option<&str>,
    parent_id: Option<String>,
) -> (ContainerRecord, u32) {
    let mut dropped = 0u32;
    let grants: Vec<PermissionGrant> = stored
        .grants
        .iter()
        .filter_map(|g| match g.principal_kind {
            PrincipalKind::Everyone => everyone_id.map(|id| PermissionGrant {
                principal_id: id.to_string(),
                ..g.clone()
            }),
            PrincipalKind::Role => match role_ids_by_name.get(g.principal_name.as_str()) {
                Some(id) => Some(PermissionGrant { principal_id: id.to_string(), ..g.clone() }),
                None => {
                    dropped += 1;
                    None
                }
            },
            PrincipalKind::Member => Some(g.clone()),
        })
        .collect();
    let record = ContainerRecord {
        id: String::new(),
        name: stored.name.clone(),
        kind: stored.kind,
        parent_id,
        parent_name: stored.parent_name.clone(),
        position: stored.position,
        grants,
    };
    (record, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(kind: PrincipalKind, name: &str) -> PermissionGrant {
        PermissionGrant {
            principal_id: "stale".into(),
            principal_kind: kind,
            allow_mask: 0x400,
            deny_mask: 0,
            principal_name: name.into(),
        }
    }

    fn container(name: &str, grants: Vec<PermissionGrant>) -> ContainerRecord {
        ContainerRecord {
            id: "old".into(),
            name: name.into(),
            kind: ContainerKind::Text,
            parent_id: None,
            parent_name: Some("general".into()),
            position: 1,
            grants,
        }
    }

    #[test]
    fn test_everyone_grant_resolves_by_convention() {
        let stored = container("rules", vec![grant(PrincipalKind::Everyone, "@everyone")]);
        let (spec, dropped) = remap_grants(&stored, &HashMap::new(), Some("ev-1"), None);
        assert_eq!(dropped, 0);
        assert_eq!(spec.grants[0].principal_id, "ev-1");
    }

    #[test]
    fn test_unmatched_role_grant_dropped() {
        let stored = container(
            "rules",
            vec![grant(PrincipalKind::Role, "mods"), grant(PrincipalKind::Role, "ghosts")],
        );
        let mut roles = HashMap::new();
        roles.insert("mods", "r-9");
        let (spec, dropped) = remap_grants(&stored, &roles, None, None);
        assert_eq!(dropped, 1);
        assert_eq!(spec.grants.len(), 1);
        assert_eq!(spec.grants[0].principal_id, "r-9");
    }

    #[test]
    fn test_member_grants_pass_through() {
        let mut g = grant(PrincipalKind::Member, "alice");
        g.principal_id = "u-7".into();
        let stored = container("rules", vec![g]);
        let (spec, dropped) = remap_grants(&stored, &HashMap::new(), None, None);
        assert_eq!(dropped, 0);
        assert_eq!(spec.grants[0].principal_id, "u-7");
    }

    #[test]
    fn test_parent_id_carried_into_spec() {
        let stored = container("rules", vec![]);
        let (spec, _) = remap_grants(&stored, &HashMap::new(), None, Some("cat-3".into()));
        assert_eq!(spec.parent_id.as_deref(), Some("cat-3"));
        assert_eq!(spec.parent_name.as_deref(), Some("general"));
    }
}
