//! Shared types for the detection side.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GuardAlert {
    pub timestamp: i64,
    pub severity: Severity,
    pub component: String,
    pub title: String,
    pub details: String,
}

/// Why an event was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IgnoreReason {
    /// Protection is disabled for the workspace.
    Disabled,
    /// The actor is serving a cooldown from an earlier trigger.
    Suspended,
    /// The actor is on the workspace allow-list.
    AllowListed,
    /// The actor is a verified automated agent.
    VerifiedAgent,
    /// No acting principal could be attributed.
    NoActor,
}

/// Outcome of feeding one event to the rate tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RecordOutcome {
    Ignored(IgnoreReason),
    /// Counted within a live window; carries the running count.
    Counted(u32),
    /// The window threshold was reached; carries the final count.
    Triggered(u32),
}

/// Verdict from one sampler comparison.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BurstVerdict {
    None,
    Burst {
        deleted_containers: Vec<String>,
        created_roles: Vec<String>,
        delete_rate: f64,
        create_rate: f64,
        elapsed_secs: i64,
    },
}

/// What the orchestrator did with one administrative event.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum EventDisposition {
    Ignored(IgnoreReason),
    Counted(u32),
    Triggered {
        count: u32,
        /// Attempts in the trailing 24h including this one.
        attempts_24h: u32,
        cooldown_secs: i64,
        sanctioned: bool,
        restore: RestoreSummary,
    },
}

/// Compact mirror of the restore engine outcome for dispositions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RestoreSummary {
    Completed,
    InProgress,
    NoData,
    FailedAllBackups,
    Skipped,
    Errored,
}
