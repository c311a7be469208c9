//! Error types shared by every pool layer

use core::fmt;

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors reported by pool operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Allocation failed
    NoMemory,

    /// A system resource other than memory was exhausted
    SystemResources,

    /// A caller-supplied argument was rejected
    BadArgument,

    /// The operation was not permitted
    NoPermission,

    /// Configuration rejected at pool creation
    BadConfig(ConfigIssue),

    /// The pool has already been shut down
    IsShutdown,

    /// A shutdown is in progress
    ShuttingDown,

    /// Destroy attempted while the pool is still running
    StillRunning,

    /// The pool is already locked
    AlreadyLocked,

    /// Unlock attempted while the pool is not locked
    NotLocked,

    /// Unlock attempted by a thread other than the locker
    LockedElsewhere,

    /// A timed wait expired before the event occurred
    Timeout,

    /// Waiting for the waiting-worker count to reach zero is not supported
    UnsupportedWait,

    /// A crash handler is already installed
    AlreadyInstalled,

    /// Unclassified failure
    Unknown,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::NoMemory => write!(f, "out of memory"),
            PoolError::SystemResources => write!(f, "system resources exhausted"),
            PoolError::BadArgument => write!(f, "bad argument"),
            PoolError::NoPermission => write!(f, "operation not permitted"),
            PoolError::BadConfig(issue) => write!(f, "bad configuration: {}", issue),
            PoolError::IsShutdown => write!(f, "pool has already been shut down"),
            PoolError::ShuttingDown => write!(f, "pool shutdown is in progress"),
            PoolError::StillRunning => write!(f, "pool is still running"),
            PoolError::AlreadyLocked => write!(f, "pool is already locked"),
            PoolError::NotLocked => write!(f, "pool is not locked"),
            PoolError::LockedElsewhere => write!(f, "pool is locked by another thread"),
            PoolError::Timeout => write!(f, "timed wait expired"),
            PoolError::UnsupportedWait => {
                write!(f, "waiting for zero waiting workers is not supported")
            }
            PoolError::AlreadyInstalled => write!(f, "a crash handler is already installed"),
            PoolError::Unknown => write!(f, "unknown error"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Reasons a configuration fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssue {
    /// Config was built against a different API version
    WrongVersion,

    /// Stack size below the platform minimum
    StackTooSmall,

    /// Stack size not a multiple of the page size
    StackNotPageAligned,

    /// Guard size below the minimum
    GuardTooSmall,

    /// Total stack plus guard memory exceeds the stack rlimit
    StackGuardTooLarge,

    /// Zero threads requested
    NoThreads,

    /// Thread count exceeds the process rlimit
    TooManyThreads,

    /// A queue resize parameter is zero
    QueueResizeZero,

    /// Process contention scope requested but unsupported on this host
    ProcessScopeUnsupported,
}

impl ConfigIssue {
    /// Stable human-readable description.
    pub fn message(&self) -> &'static str {
        match self {
            ConfigIssue::WrongVersion => "configuration built for a different API version",
            ConfigIssue::StackTooSmall => "stack size is below the platform minimum",
            ConfigIssue::StackNotPageAligned => "stack size is not a multiple of the page size",
            ConfigIssue::GuardTooSmall => "guard size is below the minimum",
            ConfigIssue::StackGuardTooLarge => {
                "requested threads times stack plus guard exceeds the stack memory limit"
            }
            ConfigIssue::NoThreads => "at least one thread must be requested",
            ConfigIssue::TooManyThreads => "thread count exceeds the system thread limit",
            ConfigIssue::QueueResizeZero => "queue resize parameters must be nonzero",
            ConfigIssue::ProcessScopeUnsupported => {
                "process contention scope is not supported on this host"
            }
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ConfigIssue {}

impl From<ConfigIssue> for PoolError {
    fn from(issue: ConfigIssue) -> Self {
        PoolError::BadConfig(issue)
    }
}

/// Error returned by task submission.
///
/// Submission is a two-step operation: push the task, then opportunistically
/// grow the worker set. `enqueued` records whether the push itself landed, so
/// a caller can tell "task queued but no extra worker spawned" apart from
/// "task rejected".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitError {
    /// Whether the task made it into the queue before the failure.
    pub enqueued: bool,
    /// The underlying error.
    pub error: PoolError,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enqueued {
            write!(f, "task enqueued, but: {}", self.error)
        } else {
            write!(f, "task rejected: {}", self.error)
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<PoolError> for SubmitError {
    fn from(error: PoolError) -> Self {
        SubmitError {
            enqueued: false,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", PoolError::Timeout), "timed wait expired");
        assert_eq!(
            format!("{}", PoolError::BadConfig(ConfigIssue::NoThreads)),
            "bad configuration: at least one thread must be requested"
        );
    }

    #[test]
    fn test_issue_conversion() {
        let err: PoolError = ConfigIssue::QueueResizeZero.into();
        assert!(matches!(err, PoolError::BadConfig(ConfigIssue::QueueResizeZero)));
    }

    #[test]
    fn test_every_issue_has_a_message() {
        let issues = [
            ConfigIssue::WrongVersion,
            ConfigIssue::StackTooSmall,
            ConfigIssue::StackNotPageAligned,
            ConfigIssue::GuardTooSmall,
            ConfigIssue::StackGuardTooLarge,
            ConfigIssue::NoThreads,
            ConfigIssue::TooManyThreads,
            ConfigIssue::QueueResizeZero,
            ConfigIssue::ProcessScopeUnsupported,
        ];
        for issue in issues {
            assert!(!issue.message().is_empty());
        }
    }

    #[test]
    fn test_submit_error_carries_enqueued() {
        let err = SubmitError {
            enqueued: true,
            error: PoolError::SystemResources,
        };
        assert!(err.enqueued);
        assert!(format!("{}", err).starts_with("task enqueued"));

        let err: SubmitError = PoolError::IsShutdown.into();
        assert!(!err.enqueued);
    }
}
