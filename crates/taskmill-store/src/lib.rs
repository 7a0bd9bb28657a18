//! `taskmill-store` — durable task records in SQLite.
//!
//! A task is a shell command with a desired execution time. The store owns
//! the full lifecycle record: when the task was scheduled, claimed, started,
//! and when it reached its terminal state. The claim operation
//! ([`TaskStore::try_claim`]) is a single conditional `UPDATE`, so two
//! schedulers polling the same database can never both own a task.

pub mod db;
pub mod error;
pub mod store;
pub mod task;

pub use error::{Result, StoreError};
pub use store::TaskStore;
pub use task::{Task, TaskState};
