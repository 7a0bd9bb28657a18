//! Runs a claimed task's command and records the outcome.
//!
//! The command executes via `sh -c` with piped output and a wall-clock
//! timeout. Every path ends in a store write: `record_completed` on exit
//! success, `record_failed` with a captured reason otherwise. Failures never
//! propagate out of the worker task.

use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use tokio::process::Command;
use tracing::{error, info, warn};

use taskmill_store::{Task, TaskStore};

/// Longest failure reason stored on the task record.
const MAX_ERROR_CHARS: usize = 512;

enum Outcome {
    Success,
    Failure(String),
}

/// Execute a claimed task: record the start, run the command, record the
/// terminal state.
///
/// An `InvalidTransition` from the store means the record is not in the state
/// this claim expects — a bug, not a runtime condition. It is logged and the
/// task is left in its last valid state, never advanced.
pub async fn execute(store: &TaskStore, task: &Task, timeout: Duration) {
    if let Err(e) = store.record_started(&task.id, Utc::now()) {
        error!(task_id = %task.id, "start record failed: {e}");
        return;
    }

    info!(task_id = %task.id, command = %task.command, "executing command");

    let result = match run_command(&task.command, timeout).await {
        Outcome::Success => store.record_completed(&task.id, Utc::now()),
        Outcome::Failure(reason) => {
            warn!(task_id = %task.id, reason = %reason, "command failed");
            store.record_failed(&task.id, Utc::now(), &reason)
        }
    };

    if let Err(e) = result {
        error!(task_id = %task.id, "terminal record failed: {e}");
    }
}

/// Run `command` via `sh -c` with a bounded wall-clock timeout.
///
/// `kill_on_drop` ensures the child dies when the timeout abandons the wait
/// future — a timed-out command does not linger past its task.
async fn run_command(command: &str, timeout: Duration) -> Outcome {
    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => return Outcome::Failure(format!("spawn failed: {e}")),
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) if output.status.success() => Outcome::Success,
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let reason = if stderr.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {}", output.status, clip(stderr, MAX_ERROR_CHARS))
            };
            Outcome::Failure(reason)
        }
        Ok(Err(e)) => Outcome::Failure(format!("wait failed: {e}")),
        Err(_elapsed) => Outcome::Failure(format!("timed out after {}s", timeout.as_secs())),
    }
}

fn clip(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut clipped: String = s.chars().take(max_chars).collect();
        clipped.push_str(" [truncated]");
        clipped
    }
}
