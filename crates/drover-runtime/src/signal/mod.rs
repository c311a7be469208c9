//! Crash-signal utilities
//!
//! Optional collaborator for catching task crashes. The pool's own
//! correctness never depends on this module: it exists so a host
//! application can observe termination signals raised while workers run
//! untrusted task code, report them, and restore the previous dispositions.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::{CrashGuard, CrashHandler, TermSignal};
