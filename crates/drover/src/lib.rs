//! # drover - elastic worker-thread pool
//!
//! Callers submit opaque units of work; a bounded-to-elastic set of OS
//! worker threads executes them; blocking and timed-blocking primitives
//! observe aggregate progress (queue drained, all workers idle, worker
//! count changed).
//!
//! ## Features
//!
//! - **Elastic sizing**: `min_threads` workers always, up to `more_threads`
//!   extra spawned under submission pressure; surplus workers retire on
//!   their own once the queue runs dry
//! - **Progress waits**: blocking and deadline-bounded waits for
//!   queue-empty, all-clear, and individual counter changes
//! - **Thread attributes**: stack size, guard size, scheduling policy and
//!   contention scope applied to every worker
//! - **Pluggable extraction**: FIFO or uniformly random task selection
//! - **Hooks**: task-failure and stats-changed closures injected through
//!   the configuration
//!
//! ## Quick Start
//!
//! ```ignore
//! use drover::{Pool, PoolConfig, Task};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = Pool::create(PoolConfig::from_env().min_threads(4))?;
//!
//!     for i in 0..16 {
//!         pool.submit(Task::new(move |_, _| {
//!             println!("task {} running", i);
//!             0
//!         }))?;
//!     }
//!
//!     pool.wait_for_clear()?;
//!     println!("{:?}", pool.stats());
//!
//!     pool.shutdown()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Caller                                │
//! │        submit(), waits, lock/unlock, shutdown               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Pool                                 │
//! │     config validation, lifecycle state, elastic growth      │
//! └─────────────────────────────────────────────────────────────┘
//!              │                               │
//!              ▼                               ▼
//!    ┌──────────────────┐            ┌──────────────────┐
//!    │    Task Queue    │◄──────────►│     Manifest     │
//!    │ grow/shrink, cv  │            │ counters, stats  │
//!    └──────────────────┘            └──────────────────┘
//!              ▲                               ▲
//!              └───────────┬───────────────────┘
//!                          │
//!            ┌─────────────┼─────────────┐
//!            ▼             ▼             ▼
//!      ┌──────────┐  ┌──────────┐  ┌──────────┐
//!      │  Worker  │  │  Worker  │  │  Worker  │
//!      │  thread  │  │  thread  │  │  thread  │
//!      └──────────┘  └──────────┘  └──────────┘
//! ```

// Re-export core types
pub use drover_core::{
    ConfigIssue, Counter, CounterEvent, FailureHook, PoolData, PoolError, PoolResult, Stats,
    SubmitError, Task, TaskData,
};

// Re-export dlog macros for debug logging
pub use drover_core::dlog::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};
pub use drover_core::{ddebug, derror, dinfo, dtrace, dwarn};

// Re-export env utilities
pub use drover_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types
pub use drover_runtime::{
    Change, Component, ContentionScope, CrashGuard, CrashHandler, Pool, PoolConfig, PoolStats,
    QueueSchedule, SchedulePolicy, StatsChangedHook, TermSignal, API_VERSION,
};

// System-limit helpers
pub use drover_runtime::limits;
