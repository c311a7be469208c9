//! Unix signal handling
//!
//! A process-wide handler is a shared resource, so registration goes
//! through an explicitly owned handle over a locked registry: at most one
//! [`CrashGuard`] is active at a time, and dropping (or restoring) it puts
//! the previous signal dispositions back.

use crate::errno::errno_to_pool;
use drover_core::{PoolError, PoolResult};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Termination signals this module can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    Hangup,
    Interrupt,
    Quit,
    Illegal,
    Abort,
    FloatingPoint,
    BadMemAddress,
    BrokenPipe,
    Alarm,
    Terminate,
    UserOne,
    UserTwo,
    BadMemAccess,
    Poll,
    ProfTimer,
    BadSyscall,
    Trap,
    VirtualAlarm,
    CpuLimit,
    FileSizeLimit,
    Unknown,
}

impl TermSignal {
    /// Every signal a [`CrashGuard`] hooks.
    pub const CATCHABLE: [TermSignal; 20] = [
        TermSignal::Hangup,
        TermSignal::Interrupt,
        TermSignal::Quit,
        TermSignal::Illegal,
        TermSignal::Abort,
        TermSignal::FloatingPoint,
        TermSignal::BadMemAddress,
        TermSignal::BrokenPipe,
        TermSignal::Alarm,
        TermSignal::Terminate,
        TermSignal::UserOne,
        TermSignal::UserTwo,
        TermSignal::BadMemAccess,
        TermSignal::Poll,
        TermSignal::ProfTimer,
        TermSignal::BadSyscall,
        TermSignal::Trap,
        TermSignal::VirtualAlarm,
        TermSignal::CpuLimit,
        TermSignal::FileSizeLimit,
    ];

    pub fn from_signum(signum: i32) -> Self {
        match signum {
            libc::SIGHUP => TermSignal::Hangup,
            libc::SIGINT => TermSignal::Interrupt,
            libc::SIGQUIT => TermSignal::Quit,
            libc::SIGILL => TermSignal::Illegal,
            libc::SIGABRT => TermSignal::Abort,
            libc::SIGFPE => TermSignal::FloatingPoint,
            libc::SIGSEGV => TermSignal::BadMemAddress,
            libc::SIGPIPE => TermSignal::BrokenPipe,
            libc::SIGALRM => TermSignal::Alarm,
            libc::SIGTERM => TermSignal::Terminate,
            libc::SIGUSR1 => TermSignal::UserOne,
            libc::SIGUSR2 => TermSignal::UserTwo,
            libc::SIGBUS => TermSignal::BadMemAccess,
            libc::SIGIO => TermSignal::Poll,
            libc::SIGPROF => TermSignal::ProfTimer,
            libc::SIGSYS => TermSignal::BadSyscall,
            libc::SIGTRAP => TermSignal::Trap,
            libc::SIGVTALRM => TermSignal::VirtualAlarm,
            libc::SIGXCPU => TermSignal::CpuLimit,
            libc::SIGXFSZ => TermSignal::FileSizeLimit,
            _ => TermSignal::Unknown,
        }
    }

    fn signo(&self) -> Option<Signal> {
        match self {
            TermSignal::Hangup => Some(Signal::SIGHUP),
            TermSignal::Interrupt => Some(Signal::SIGINT),
            TermSignal::Quit => Some(Signal::SIGQUIT),
            TermSignal::Illegal => Some(Signal::SIGILL),
            TermSignal::Abort => Some(Signal::SIGABRT),
            TermSignal::FloatingPoint => Some(Signal::SIGFPE),
            TermSignal::BadMemAddress => Some(Signal::SIGSEGV),
            TermSignal::BrokenPipe => Some(Signal::SIGPIPE),
            TermSignal::Alarm => Some(Signal::SIGALRM),
            TermSignal::Terminate => Some(Signal::SIGTERM),
            TermSignal::UserOne => Some(Signal::SIGUSR1),
            TermSignal::UserTwo => Some(Signal::SIGUSR2),
            TermSignal::BadMemAccess => Some(Signal::SIGBUS),
            TermSignal::Poll => Some(Signal::SIGIO),
            TermSignal::ProfTimer => Some(Signal::SIGPROF),
            TermSignal::BadSyscall => Some(Signal::SIGSYS),
            TermSignal::Trap => Some(Signal::SIGTRAP),
            TermSignal::VirtualAlarm => Some(Signal::SIGVTALRM),
            TermSignal::CpuLimit => Some(Signal::SIGXCPU),
            TermSignal::FileSizeLimit => Some(Signal::SIGXFSZ),
            TermSignal::Unknown => None,
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> &'static str {
        match self {
            TermSignal::Hangup => {
                "hangup detected on controlling terminal or death of controlling process"
            }
            TermSignal::Interrupt => "interrupt from keyboard",
            TermSignal::Quit => "quit from keyboard",
            TermSignal::Illegal => "illegal instruction received",
            TermSignal::Abort => "abort signal from call to abort(3)",
            TermSignal::FloatingPoint => "floating point arithmetic exception",
            TermSignal::BadMemAddress => "invalid memory reference",
            TermSignal::BrokenPipe => "broken pipe or write to pipe with no readers",
            TermSignal::Alarm => "timer signal received from call to alarm(2)",
            TermSignal::Terminate => "termination signal from system",
            TermSignal::UserOne => "user-defined signal 1",
            TermSignal::UserTwo => "user-defined signal 2",
            TermSignal::BadMemAccess => "bus error - bad access to memory",
            TermSignal::Poll => "pollable event encountered",
            TermSignal::ProfTimer => "profiling timer expired",
            TermSignal::BadSyscall => "bad argument passed to routine",
            TermSignal::Trap => "trace/breakpoint trap reached",
            TermSignal::VirtualAlarm => "virtual alarm clock triggered",
            TermSignal::CpuLimit => "system imposed CPU time limit exceeded",
            TermSignal::FileSizeLimit => "system imposed file size limit exceeded",
            TermSignal::Unknown => "signal not recognized by drover signal handling",
        }
    }

    /// Whether the default disposition of this signal dumps core.
    pub fn core_dumps(&self) -> bool {
        matches!(
            self,
            TermSignal::Quit
                | TermSignal::Illegal
                | TermSignal::Abort
                | TermSignal::FloatingPoint
                | TermSignal::BadMemAddress
                | TermSignal::BadMemAccess
                | TermSignal::BadSyscall
                | TermSignal::Trap
                | TermSignal::CpuLimit
                | TermSignal::FileSizeLimit
        )
    }
}

/// Handler invoked from signal context. Must be async-signal-safe: no
/// allocation, no locks.
pub type CrashHandler = fn(TermSignal);

struct Installed {
    previous: Vec<(Signal, SigAction)>,
}

/// Registry of the single active installation.
static ACTIVE: Mutex<Option<Installed>> = Mutex::new(None);

/// The user handler, stored as a plain function pointer so the dispatch
/// routine can read it without taking a lock.
static HANDLER_FN: AtomicUsize = AtomicUsize::new(0);

extern "C" fn dispatch(signum: libc::c_int) {
    let raw = HANDLER_FN.load(Ordering::Acquire);
    if raw != 0 {
        let handler: CrashHandler = unsafe { std::mem::transmute(raw) };
        handler(TermSignal::from_signum(signum));
    }
}

/// Owned registration of a process-wide crash handler.
///
/// Install hooks every [`TermSignal::CATCHABLE`] signal; restore (explicit
/// or on drop) reinstates the dispositions captured at install time.
pub struct CrashGuard {
    _priv: (),
}

impl CrashGuard {
    /// Install `handler` for every catchable termination signal.
    ///
    /// Fails with `AlreadyInstalled` while another guard is live. A
    /// sigaction failure mid-install rolls back the signals hooked so far.
    pub fn install(handler: CrashHandler) -> PoolResult<CrashGuard> {
        let mut active = ACTIVE.lock();
        if active.is_some() {
            return Err(PoolError::AlreadyInstalled);
        }
        HANDLER_FN.store(handler as usize, Ordering::Release);
        let action = SigAction::new(SigHandler::Handler(dispatch), SaFlags::empty(), SigSet::empty());
        let mut previous: Vec<(Signal, SigAction)> = Vec::new();
        for term in TermSignal::CATCHABLE {
            let signal = term.signo().expect("catchable signals all map to a signo");
            match unsafe { sigaction(signal, &action) } {
                Ok(old) => previous.push((signal, old)),
                Err(err) => {
                    for (signal, old) in previous.into_iter().rev() {
                        let _ = unsafe { sigaction(signal, &old) };
                    }
                    HANDLER_FN.store(0, Ordering::Release);
                    return Err(errno_to_pool(err as i32));
                }
            }
        }
        *active = Some(Installed { previous });
        Ok(CrashGuard { _priv: () })
    }

    /// Restore the previous dispositions and release the registry.
    pub fn restore(self) -> PoolResult<()> {
        Self::restore_registry();
        Ok(())
    }

    fn restore_registry() {
        let mut active = ACTIVE.lock();
        if let Some(installed) = active.take() {
            for (signal, old) in installed.previous.into_iter().rev() {
                let _ = unsafe { sigaction(signal, &old) };
            }
            HANDLER_FN.store(0, Ordering::Release);
        }
    }
}

impl Drop for CrashGuard {
    fn drop(&mut self) {
        Self::restore_registry();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn test_signum_roundtrip() {
        for term in TermSignal::CATCHABLE {
            let signal = term.signo().unwrap();
            assert_eq!(TermSignal::from_signum(signal as i32), term);
        }
        assert_eq!(TermSignal::from_signum(-1), TermSignal::Unknown);
    }

    #[test]
    fn test_messages_cover_every_signal() {
        for term in TermSignal::CATCHABLE {
            assert!(!term.message().is_empty());
        }
        assert!(!TermSignal::Unknown.message().is_empty());
    }

    #[test]
    fn test_core_dump_classification() {
        assert!(TermSignal::BadMemAddress.core_dumps());
        assert!(TermSignal::Abort.core_dumps());
        assert!(!TermSignal::Interrupt.core_dumps());
        assert!(!TermSignal::Terminate.core_dumps());
    }

    static LAST_SEEN: AtomicI32 = AtomicI32::new(0);

    fn recording_handler(signal: TermSignal) {
        if signal == TermSignal::UserOne {
            LAST_SEEN.store(libc::SIGUSR1, Ordering::SeqCst);
        }
    }

    fn noop_handler(_signal: TermSignal) {}

    #[test]
    fn test_registry_is_exclusive_and_dispatches() {
        let guard = CrashGuard::install(recording_handler).unwrap();
        assert!(matches!(
            CrashGuard::install(noop_handler),
            Err(PoolError::AlreadyInstalled)
        ));

        nix::sys::signal::raise(Signal::SIGUSR1).unwrap();
        assert_eq!(LAST_SEEN.load(Ordering::SeqCst), libc::SIGUSR1);

        guard.restore().unwrap();
        // Registry is free again.
        let guard = CrashGuard::install(noop_handler).unwrap();
        drop(guard);
    }
}
