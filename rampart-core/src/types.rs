//! Structural record types shared by the detection and recovery engines.

// ── Containers and roles ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ContainerKind {
    Text,
    Voice,
    Category,
    Forum,
    Announcement,
}

impl ContainerKind {
    pub fn is_category(&self) -> bool {
        matches!(self, ContainerKind::Category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PrincipalKind {
    Role,
    Member,
    Everyone,
}

/// One permission overwrite on a container. Principal names travel with the
/// grant because ids do not survive destroy/recreate cycles on the platform.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PermissionGrant {
    pub principal_id: String,
    pub principal_kind: PrincipalKind,
    pub allow_mask: u64,
    pub deny_mask: u64,
    pub principal_name: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub kind: ContainerKind,
    pub parent_id: Option<String>,
    pub parent_name: Option<String>,
    pub position: i32,
    pub grants: Vec<PermissionGrant>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RoleRecord {
    pub id: String,
    pub name: String,
    pub color: u32,
    pub hoisted: bool,
    pub permission_mask: u64,
    pub position: i32,
    /// Owned by an integration; cannot be edited or deleted.
    pub managed: bool,
    /// The implicit workspace-wide pseudo-role.
    pub everyone: bool,
}

impl RoleRecord {
    pub fn is_editable(&self) -> bool {
        !self.managed && !self.everyone
    }
}

// ── Administrative events ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AdminActionKind {
    ContainerDelete,
    ContainerCreate,
    RoleDelete,
    RoleCreate,
    MemberPurge,
    WebhookCreate,
}

/// A structural change observed in a workspace, as delivered by the host.
/// `actor_id` is `None` when the host could not correlate the change to an
/// acting principal; the orchestrator falls back to the attribution provider.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdminEvent {
    pub workspace_id: String,
    pub actor_id: Option<String>,
    pub kind: AdminActionKind,
    pub resource_label: String,
    pub timestamp: i64,
}

// ── Protection settings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResponsePolicy {
    /// Sanction the actor, then restore structure.
    Ban,
    /// Restore structure without sanctioning.
    RestoreOnly,
    /// Alert only; neither sanction nor restore.
    NotifyOnly,
}

/// Per-workspace protection configuration, stored as a JSON blob in the
/// durable store and served through a short-TTL cache.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProtectionSettings {
    pub enabled: bool,
    pub threshold_count: u32,
    pub threshold_window_secs: i64,
    pub ignore_trusted_principals: bool,
    pub ignore_verified_agents: bool,
    pub response_policy: ResponsePolicy,
}

impl Default for ProtectionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_count: 5,
            threshold_window_secs: 10,
            ignore_trusted_principals: true,
            ignore_verified_agents: true,
            response_policy: ResponsePolicy::Ban,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_kind() {
        assert!(ContainerKind::Category.is_category());
        assert!(!ContainerKind::Text.is_category());
    }

    #[test]
    fn test_settings_roundtrip() {
        let s = ProtectionSettings { enabled: true, ..Default::default() };
        let blob = serde_json::to_vec(&s).unwrap();
        let back: ProtectionSettings = serde_json::from_slice(&blob).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn test_role_editability() {
        let mut r = RoleRecord {
            id: "r1".into(), name: "mods".into(), color: 0, hoisted: false,
            permission_mask: 0, position: 3, managed: false, everyone: false,
        };
        assert!(r.is_editable());
        r.managed = true;
        assert!(!r.is_editable());
    }
}
