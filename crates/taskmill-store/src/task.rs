use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Lifecycle state of a task, derived from which timestamps are populated.
///
/// Transitions are one-way: `Scheduled → Picked → Running → {Completed |
/// Failed}`. The state is never stored — it is recomputed from the record so
/// it cannot disagree with the timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for its scheduled time; not yet claimed by any worker.
    Scheduled,
    /// Claimed by exactly one worker, execution not yet begun.
    Picked,
    /// The command is executing.
    Running,
    /// The command exited successfully.
    Completed,
    /// The command errored, timed out, or could not be spawned.
    Failed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Scheduled => "scheduled",
            TaskState::Picked => "picked",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A persisted task record.
#[derive(Debug, Clone)]
pub struct Task {
    /// UUID v4 string — primary key, assigned at insert.
    pub id: String,
    /// The `sh -c` command line to execute.
    pub command: String,
    /// Earliest instant the task may run.
    pub scheduled_at: DateTime<Utc>,
    /// Set once by the winning `try_claim`; NULL means unclaimed.
    pub picked_at: Option<DateTime<Utc>>,
    /// Worker token of the claim winner.
    pub picked_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    /// Failure reason, populated together with `failed_at`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Derive the lifecycle state from the populated timestamps.
    pub fn state(&self) -> TaskState {
        if self.failed_at.is_some() {
            TaskState::Failed
        } else if self.completed_at.is_some() {
            TaskState::Completed
        } else if self.started_at.is_some() {
            TaskState::Running
        } else if self.picked_at.is_some() {
            TaskState::Picked
        } else {
            TaskState::Scheduled
        }
    }

    /// True once a terminal timestamp is set; the record is immutable after.
    pub fn is_terminal(&self) -> bool {
        self.completed_at.is_some() || self.failed_at.is_some()
    }
}

/// Format a timestamp for storage.
///
/// Fixed-width RFC3339 (microsecond precision, trailing `Z`) so that
/// lexicographic TEXT comparison in SQL equals chronological comparison.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back into a `DateTime<Utc>`.
pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
