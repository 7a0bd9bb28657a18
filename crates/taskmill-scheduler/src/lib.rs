//! `taskmill-scheduler` — Tokio polling engine that drives tasks through
//! their lifecycle.
//!
//! # Overview
//!
//! The [`engine::SchedulerEngine`] polls the store on a fixed interval for
//! due, unclaimed tasks, claims each candidate with an atomic conditional
//! update, and dispatches won claims to the [`executor`] without blocking the
//! next poll. Execution concurrency is bounded by a semaphore: claiming is
//! eager (to keep the claim race short), waiting happens before execution.
//!
//! Exactly one execution attempt is made per claim. A failed command is
//! terminal — callers resubmit as a new task if they want a retry.

pub mod engine;
pub mod executor;

pub use engine::SchedulerEngine;
