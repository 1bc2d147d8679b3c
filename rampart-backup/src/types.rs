//! Shared types for the recovery side.

use rampart_core::types::{ContainerRecord, RoleRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BackupAlert {
    pub timestamp: i64,
    pub severity: Severity,
    pub component: String,
    pub title: String,
    pub details: String,
}

/// One captured, validated snapshot of a workspace's full structure.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BackupVersion {
    pub containers: Vec<ContainerRecord>,
    pub roles: Vec<RoleRecord>,
    pub taken_at: i64,
    pub workspace_name: String,
    pub container_count: usize,
    pub role_count: usize,
}

/// Persisted per-workspace history: ordered newest first, bounded.
pub type BackupHistory = Vec<BackupVersion>;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BackupMeta {
    pub taken_at: i64,
    pub container_count: usize,
    pub role_count: usize,
    pub history_depth: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BackupOutcome {
    Completed(BackupMeta),
    /// Another capture for this workspace is already running.
    InProgress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RestoreStats {
    pub version_taken_at: i64,
    pub roles_deleted: u32,
    pub containers_deleted: u32,
    pub roles_created: u32,
    pub containers_created: u32,
    pub grants_dropped: u32,
    /// Per-object platform failures tolerated during the pass.
    pub object_failures: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RestoreOutcome {
    Completed(RestoreStats),
    /// Another restore for this workspace is already running.
    InProgress,
    /// No backup history exists for the workspace.
    NoData,
    /// Every retained version failed validation or application.
    FailedAllBackups,
}
