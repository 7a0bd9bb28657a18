use rusqlite::Connection;

use crate::error::Result;

/// Initialise the task schema in `conn`.
///
/// Creates the `tasks` table (idempotent) and a partial index over unclaimed
/// rows so the due-task poll stays efficient as terminal rows accumulate.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id           TEXT NOT NULL PRIMARY KEY,
            command      TEXT NOT NULL,
            scheduled_at TEXT NOT NULL,   -- RFC3339 UTC, fixed width
            picked_at    TEXT,            -- NULL = unclaimed
            picked_by    TEXT,            -- token of the claiming worker
            started_at   TEXT,
            completed_at TEXT,
            failed_at    TEXT,
            error        TEXT,            -- failure reason when failed_at is set
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        ) STRICT;

        -- Efficient polling: SELECT … WHERE picked_at IS NULL AND scheduled_at <= ?
        CREATE INDEX IF NOT EXISTS idx_tasks_due
            ON tasks (scheduled_at) WHERE picked_at IS NULL;
        ",
    )?;
    Ok(())
}
