use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::task::{fmt_ts, parse_ts, Task};

const BUSY_TIMEOUT: Duration = Duration::from_secs(3);

const TASK_COLUMNS: &str = "id, command, scheduled_at, picked_at, picked_by,
     started_at, completed_at, failed_at, error, created_at, updated_at";

/// Thread-safe store for persisted tasks.
///
/// Wraps a single SQLite connection in a `Mutex`. Each subsystem opens its
/// own connection to the same database file; cross-process exclusivity is
/// guaranteed by the conditional `UPDATE` in [`TaskStore::try_claim`], not by
/// this lock.
pub struct TaskStore {
    db: Mutex<Connection>,
}

impl TaskStore {
    /// Wrap a connection, initialising the schema if needed.
    ///
    /// Sets a busy timeout so no store call can block the caller
    /// indefinitely when another connection holds the write lock.
    pub fn new(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Persist a new task in `Scheduled` state and return the full record.
    pub fn insert(&self, command: &str, scheduled_at: DateTime<Utc>) -> Result<Task> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO tasks (id, command, scheduled_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![id, command, fmt_ts(scheduled_at), fmt_ts(now)],
        )?;

        info!(task_id = %id, scheduled_at = %scheduled_at, "task inserted");

        Ok(Task {
            id,
            command: command.to_string(),
            scheduled_at,
            picked_at: None,
            picked_by: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Return due, unclaimed tasks: `scheduled_at <= now` and no `picked_at`.
    ///
    /// Ordered earliest-due first, with id as a stable tie-break for equal
    /// timestamps, capped at `limit`.
    pub fn find_due_unclaimed(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Task>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE picked_at IS NULL AND scheduled_at <= ?1
             ORDER BY scheduled_at ASC, id ASC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![fmt_ts(now), limit],
            row_to_task,
        )?;
        let tasks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Atomically claim a task: set `picked_at` only if currently unset.
    ///
    /// Returns whether this caller won. The guard lives in the `WHERE`
    /// clause, so under concurrent callers SQLite serialises the updates and
    /// exactly one sees an affected row. Losing is normal, not an error.
    pub fn try_claim(&self, id: &str, worker_token: &str, now: DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE tasks SET picked_at = ?2, picked_by = ?3, updated_at = ?2
             WHERE id = ?1 AND picked_at IS NULL",
            rusqlite::params![id, fmt_ts(now), worker_token],
        )?;
        if n == 1 {
            info!(task_id = %id, worker = %worker_token, "task claimed");
        } else {
            debug!(task_id = %id, "claim lost");
        }
        Ok(n == 1)
    }

    /// Record the start of execution. Requires a prior claim and no prior
    /// start.
    pub fn record_started(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE tasks SET started_at = ?2, updated_at = ?2
             WHERE id = ?1 AND picked_at IS NOT NULL AND started_at IS NULL",
            rusqlite::params![id, fmt_ts(now)],
        )?;
        guard_transition(&db, id, n, "started_at requires a claim and no prior start")
    }

    /// Record successful completion. Requires a prior start and no terminal
    /// timestamp.
    pub fn record_completed(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE tasks SET completed_at = ?2, updated_at = ?2
             WHERE id = ?1 AND started_at IS NOT NULL
               AND completed_at IS NULL AND failed_at IS NULL",
            rusqlite::params![id, fmt_ts(now)],
        )?;
        guard_transition(&db, id, n, "completed_at requires a start and no terminal state")
    }

    /// Record failure with its reason. Requires a prior start and no terminal
    /// timestamp.
    pub fn record_failed(&self, id: &str, now: DateTime<Utc>, err_info: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE tasks SET failed_at = ?2, error = ?3, updated_at = ?2
             WHERE id = ?1 AND started_at IS NOT NULL
               AND completed_at IS NULL AND failed_at IS NULL",
            rusqlite::params![id, fmt_ts(now), err_info],
        )?;
        guard_transition(&db, id, n, "failed_at requires a start and no terminal state")
    }

    /// Fetch a task by id.
    ///
    /// Rejects non-UUID ids with `InvalidId` before touching the database.
    pub fn get(&self, id: &str) -> Result<Task> {
        if Uuid::parse_str(id).is_err() {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            rusqlite::params![id],
            row_to_task,
        ) {
            Ok(task) => Ok(task),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::TaskNotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(StoreError::Database(e)),
        }
    }
}

/// Resolve a zero-row guarded UPDATE into the right error: the row is either
/// missing entirely or in a state the transition does not allow.
fn guard_transition(
    db: &Connection,
    id: &str,
    rows_changed: usize,
    detail: &'static str,
) -> Result<()> {
    if rows_changed == 1 {
        return Ok(());
    }
    let exists: bool = db.query_row(
        "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
        rusqlite::params![id],
        |row| row.get(0),
    )?;
    if exists {
        Err(StoreError::InvalidTransition {
            id: id.to_string(),
            detail,
        })
    } else {
        Err(StoreError::TaskNotFound { id: id.to_string() })
    }
}

/// Map a SQLite row to a `Task`.
fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        command: row.get(1)?,
        scheduled_at: get_ts(row, 2)?,
        picked_at: get_opt_ts(row, 3)?,
        picked_by: row.get(4)?,
        started_at: get_opt_ts(row, 5)?,
        completed_at: get_opt_ts(row, 6)?,
        failed_at: get_opt_ts(row, 7)?,
        error: row.get(8)?,
        created_at: get_ts(row, 9)?,
        updated_at: get_ts(row, 10)?,
    })
}

fn get_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn get_opt_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        parse_ts(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}
