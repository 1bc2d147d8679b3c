//! Collaborator seams — the narrow interfaces through which the engine
//! talks to the outside world. The host wires real platform clients behind
//! these; tests wire in-memory fakes.

use crate::error::RampartResult;
use crate::types::{AdminActionKind, ContainerRecord, RoleRecord};

/// Live structural operations on a workspace. Used by backup capture, the
/// snapshot sampler, and the restore engine.
pub trait StructureProvider: Send + Sync {
    fn list_containers(&self, workspace: &str) -> RampartResult<Vec<ContainerRecord>>;
    fn list_roles(&self, workspace: &str) -> RampartResult<Vec<RoleRecord>>;
    /// Create a container from a stored record; returns the new live id.
    /// The platform assigns ids and positions on creation.
    fn create_container(&self, workspace: &str, spec: &ContainerRecord) -> RampartResult<String>;
    fn delete_container(&self, workspace: &str, container_id: &str) -> RampartResult<()>;
    fn create_role(&self, workspace: &str, spec: &RoleRecord) -> RampartResult<String>;
    fn delete_role(&self, workspace: &str, role_id: &str) -> RampartResult<()>;
}

/// Sanctioning operations against principals.
pub trait SanctionProvider: Send + Sync {
    /// Ban an actor from a workspace, purging their recent contributions
    /// within `purge_window_secs` of history.
    fn ban_principal(
        &self,
        workspace: &str,
        actor_id: &str,
        reason: &str,
        purge_window_secs: i64,
    ) -> RampartResult<()>;
}

/// Audit-trail correlation: which principal performed a recent structural
/// change. Implementations carry their own short delay budget and return
/// `Ok(None)` rather than block when the trail is slow or rate-limited.
pub trait AttributionProvider: Send + Sync {
    fn actor_for(
        &self,
        workspace: &str,
        kind: AdminActionKind,
        resource_label: &str,
    ) -> RampartResult<Option<String>>;
}

/// Identity lookups for acting principals. Answers are cached by the
/// principal info cache with a multi-minute TTL.
pub trait IdentityProvider: Send + Sync {
    fn is_automated_agent(&self, actor_id: &str) -> RampartResult<bool>;
    fn is_verified_agent(&self, actor_id: &str) -> RampartResult<bool>;
}

/// Key-value access to durable state. Settings and backup history are opaque
/// JSON blobs keyed by workspace id; the allow-list is a membership check
/// keyed by (workspace, principal).
///
/// A read failure is an error, never "no data" — only `Ok(None)` means the
/// row is absent.
pub trait DurableStore: Send + Sync {
    fn load_settings(&self, workspace: &str) -> RampartResult<Option<Vec<u8>>>;
    fn store_settings(&self, workspace: &str, blob: &[u8]) -> RampartResult<()>;
    fn load_backup_history(&self, workspace: &str) -> RampartResult<Option<Vec<u8>>>;
    fn store_backup_history(&self, workspace: &str, blob: &[u8]) -> RampartResult<()>;
    fn is_allow_listed(&self, workspace: &str, principal_id: &str) -> RampartResult<bool>;
}

/// Best-effort operator notification. Callers log failures and move on.
pub trait NotificationSink: Send + Sync {
    fn post(&self, workspace: &str, message: &str) -> RampartResult<()>;
}
