//! # drover-runtime
//!
//! Platform-specific runtime for the drover worker pool.
//!
//! This crate provides:
//! - Thread creation attributes (stack size, guard size, scheduling policy,
//!   contention scope)
//! - System-limit queries (page size, CPU count, rlimits)
//! - Worker thread lifecycle and the generator that spawns workers
//! - The pool orchestrator and its public lifecycle API
//! - Crash-signal utilities (optional collaborator for catching task crashes)

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        pub mod attr;
        pub mod config;
        pub mod errno;
        pub mod limits;
        pub mod pool;
        pub mod signal;
        pub mod worker;
    } else {
        compile_error!("drover-runtime currently supports Unix platforms only");
    }
}

/// POSIX thread contention-scope bindings.
///
/// The `libc` crate does not expose `pthread_attr_setscope` or the
/// `PTHREAD_SCOPE_*` constants on linux-gnu/android, so declare the POSIX
/// bindings directly there. On other Unix targets (e.g. Apple) `libc`
/// provides them, so re-export those to keep the platform-correct values.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) mod pthread_scope {
    pub const PTHREAD_SCOPE_SYSTEM: libc::c_int = 0;
    pub const PTHREAD_SCOPE_PROCESS: libc::c_int = 1;
    extern "C" {
        pub fn pthread_attr_setscope(
            attr: *mut libc::pthread_attr_t,
            scope: libc::c_int,
        ) -> libc::c_int;
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) mod pthread_scope {
    pub use libc::{pthread_attr_setscope, PTHREAD_SCOPE_PROCESS, PTHREAD_SCOPE_SYSTEM};
}

// Re-exports
pub use attr::ThreadAttr;
pub use config::{ContentionScope, PoolConfig, QueueSchedule, SchedulePolicy, API_VERSION};
pub use pool::{Change, Component, Pool, PoolStats, StatsChangedHook};
pub use signal::{CrashGuard, CrashHandler, TermSignal};
