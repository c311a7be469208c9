//! # drover-core
//!
//! Core types for the drover worker pool.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Thread creation, system-limit queries and signal utilities live in
//! `drover-runtime`.
//!
//! ## Modules
//!
//! - `task` - opaque unit of work submitted to the pool
//! - `counter` - condition-variable-backed event counter
//! - `manifest` - lock-guarded aggregate of pool statistics
//! - `queue` - growable task queue with pluggable extraction order
//! - `error` - error taxonomy shared by every layer
//! - `env` - environment variable utilities
//! - `dlog` - kernel-style debug printing macros

pub mod counter;
pub mod dlog;
pub mod env;
pub mod error;
pub mod manifest;
pub mod queue;
pub mod task;

// Re-exports for convenience
pub use counter::{Counter, CounterEvent};
pub use env::{env_get, env_get_bool, env_get_opt};
pub use error::{ConfigIssue, PoolError, PoolResult, SubmitError};
pub use manifest::{CounterTarget, Manifest, ManifestGuard, Stats, StatsHook};
pub use queue::{ExtractOrder, OwnedQueueGuard, QueueGuard, QueueSettings, TaskQueue};
pub use task::{FailureHook, PoolData, Task, TaskData, WorkFn};
