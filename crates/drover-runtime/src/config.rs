//! Pool configuration
//!
//! Compile-time defaults with runtime environment overrides and a builder
//! for programmatic setup.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder setters
//! 2. Environment variables (`from_env`)
//! 3. Library defaults (platform queries)
//!
//! # Example
//!
//! ```ignore
//! use drover_runtime::PoolConfig;
//!
//! let config = PoolConfig::from_env()
//!     .min_threads(4)
//!     .more_threads(4);
//! config.validate()?;
//! ```

use crate::limits;
use crate::pool::StatsChangedHook;
use drover_core::env::env_get;
use drover_core::queue::ExtractOrder;
use drover_core::{ConfigIssue, FailureHook, PoolData};

/// Version of the configuration layout this library was built against.
pub const API_VERSION: u8 = 1;

/// Default initial queue capacity.
pub const DEFAULT_QUEUE_SIZE: usize = 64;

/// Default slack that triggers queue compaction.
pub const DEFAULT_SHRINK_THRESHOLD: usize = 16;

/// Default growth step when the queue is full.
pub const DEFAULT_GROW_INCREMENT: usize = 16;

/// Smallest accepted guard region.
pub const MIN_GUARD_SIZE: usize = 1024;

/// Thread scheduling policy for worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    /// Inherit the platform default.
    Default,
    /// SCHED_FIFO real-time scheduling.
    Fifo,
    /// SCHED_RR real-time scheduling.
    RoundRobin,
}

/// Contention scope for worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentionScope {
    Default,
    Process,
    System,
}

/// Order in which pending tasks leave the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSchedule {
    /// Platform default, which is FIFO.
    Default,
    Fifo,
    /// Uniformly random pending task.
    Random,
}

impl QueueSchedule {
    pub(crate) fn extract_order(self) -> ExtractOrder {
        match self {
            QueueSchedule::Default | QueueSchedule::Fifo => ExtractOrder::Fifo,
            QueueSchedule::Random => ExtractOrder::Random,
        }
    }
}

/// Validated, immutable pool configuration snapshot.
#[derive(Clone)]
pub struct PoolConfig {
    /// Must equal [`API_VERSION`].
    pub api_version: u8,
    /// Worker stack size in bytes; page-aligned, at least `limits::min_stack()`.
    pub stack_size: usize,
    /// Worker guard region in bytes; at least [`MIN_GUARD_SIZE`].
    pub guard_size: usize,
    pub contention_scope: ContentionScope,
    pub thread_schedule: SchedulePolicy,
    /// Workers kept alive even when idle.
    pub min_threads: usize,
    /// Additional workers spawned under submission pressure.
    pub more_threads: usize,
    pub queue_schedule: QueueSchedule,
    /// Initial queue capacity.
    pub initial_queue: usize,
    /// Slack (capacity minus pending) that triggers compaction. Nonzero.
    pub queue_shrink_threshold: usize,
    /// Entries added per queue growth step. Nonzero.
    pub queue_grow_increment: usize,
    /// Invoked when a task returns a nonzero exit code.
    pub on_task_failed: Option<FailureHook>,
    /// Invoked whenever a manifest critical section changes the stats.
    pub on_stats_changed: Option<StatsChangedHook>,
    /// Opaque pool-wide userdata handed to every task.
    pub userdata: Option<PoolData>,
}

impl PoolConfig {
    /// Library defaults from platform queries: system default stack, one
    /// page of guard, one worker per online processor, no elastic extras.
    pub fn new() -> Self {
        Self {
            api_version: API_VERSION,
            stack_size: limits::sys_default_stack(),
            guard_size: limits::default_guard(),
            contention_scope: ContentionScope::Default,
            thread_schedule: SchedulePolicy::Default,
            min_threads: limits::hardware_concurrency(),
            more_threads: 0,
            queue_schedule: QueueSchedule::Default,
            initial_queue: DEFAULT_QUEUE_SIZE,
            queue_shrink_threshold: DEFAULT_SHRINK_THRESHOLD,
            queue_grow_increment: DEFAULT_GROW_INCREMENT,
            on_task_failed: None,
            on_stats_changed: None,
            userdata: None,
        }
    }

    /// Defaults with environment overrides for the scalar fields.
    ///
    /// Environment variables (all optional):
    /// - `DRV_STACK_SIZE` - worker stack size in bytes
    /// - `DRV_GUARD_SIZE` - guard region in bytes
    /// - `DRV_MIN_THREADS` - minimum worker count
    /// - `DRV_MORE_THREADS` - elastic extra workers
    /// - `DRV_QUEUE_INITIAL` - initial queue capacity
    /// - `DRV_QUEUE_SHRINK` - compaction slack threshold
    /// - `DRV_QUEUE_GROW` - growth increment
    pub fn from_env() -> Self {
        let base = Self::new();
        Self {
            stack_size: env_get("DRV_STACK_SIZE", base.stack_size),
            guard_size: env_get("DRV_GUARD_SIZE", base.guard_size),
            min_threads: env_get("DRV_MIN_THREADS", base.min_threads),
            more_threads: env_get("DRV_MORE_THREADS", base.more_threads),
            initial_queue: env_get("DRV_QUEUE_INITIAL", base.initial_queue),
            queue_shrink_threshold: env_get("DRV_QUEUE_SHRINK", base.queue_shrink_threshold),
            queue_grow_increment: env_get("DRV_QUEUE_GROW", base.queue_grow_increment),
            ..base
        }
    }

    // Builder methods

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn guard_size(mut self, size: usize) -> Self {
        self.guard_size = size;
        self
    }

    pub fn contention_scope(mut self, scope: ContentionScope) -> Self {
        self.contention_scope = scope;
        self
    }

    pub fn thread_schedule(mut self, policy: SchedulePolicy) -> Self {
        self.thread_schedule = policy;
        self
    }

    pub fn min_threads(mut self, n: usize) -> Self {
        self.min_threads = n;
        self
    }

    pub fn more_threads(mut self, n: usize) -> Self {
        self.more_threads = n;
        self
    }

    pub fn queue_schedule(mut self, schedule: QueueSchedule) -> Self {
        self.queue_schedule = schedule;
        self
    }

    pub fn initial_queue(mut self, capacity: usize) -> Self {
        self.initial_queue = capacity;
        self
    }

    pub fn queue_shrink_threshold(mut self, slack: usize) -> Self {
        self.queue_shrink_threshold = slack;
        self
    }

    pub fn queue_grow_increment(mut self, step: usize) -> Self {
        self.queue_grow_increment = step;
        self
    }

    pub fn on_task_failed(mut self, hook: FailureHook) -> Self {
        self.on_task_failed = Some(hook);
        self
    }

    pub fn on_stats_changed(mut self, hook: StatsChangedHook) -> Self {
        self.on_stats_changed = Some(hook);
        self
    }

    pub fn userdata(mut self, data: PoolData) -> Self {
        self.userdata = Some(data);
        self
    }

    /// Validate the configuration against platform limits.
    ///
    /// Runs synchronously at pool creation, before any thread is spawned.
    pub fn validate(&self) -> Result<(), ConfigIssue> {
        if self.api_version != API_VERSION {
            return Err(ConfigIssue::WrongVersion);
        }
        if self.guard_size < MIN_GUARD_SIZE {
            return Err(ConfigIssue::GuardTooSmall);
        }
        if self.stack_size < limits::min_stack() {
            return Err(ConfigIssue::StackTooSmall);
        }
        if self.stack_size % limits::page_size() != 0 {
            return Err(ConfigIssue::StackNotPageAligned);
        }
        if self.queue_grow_increment == 0 || self.queue_shrink_threshold == 0 {
            return Err(ConfigIssue::QueueResizeZero);
        }
        if self.min_threads == 0 && self.more_threads == 0 {
            return Err(ConfigIssue::NoThreads);
        }
        // One extra slot for the submitting thread itself.
        let max_threads = self
            .min_threads
            .saturating_add(self.more_threads)
            .saturating_add(1) as u64;
        let (soft_threads, _) = limits::max_threads_rlimit();
        if limits::value_exceeds_limit(max_threads, soft_threads) {
            return Err(ConfigIssue::TooManyThreads);
        }
        let per_thread = (self.stack_size as u64).saturating_add(self.guard_size as u64);
        let (soft_stack, _) = limits::max_stack_rlimit();
        if limits::value_exceeds_limit(max_threads.saturating_mul(per_thread), soft_stack) {
            return Err(ConfigIssue::StackGuardTooLarge);
        }
        if self.contention_scope == ContentionScope::Process && !limits::proc_scope_supported() {
            return Err(ConfigIssue::ProcessScopeUnsupported);
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("api_version", &self.api_version)
            .field("stack_size", &self.stack_size)
            .field("guard_size", &self.guard_size)
            .field("contention_scope", &self.contention_scope)
            .field("thread_schedule", &self.thread_schedule)
            .field("min_threads", &self.min_threads)
            .field("more_threads", &self.more_threads)
            .field("queue_schedule", &self.queue_schedule)
            .field("initial_queue", &self.initial_queue)
            .field("queue_shrink_threshold", &self.queue_shrink_threshold)
            .field("queue_grow_increment", &self.queue_grow_increment)
            .field("on_task_failed", &self.on_task_failed.is_some())
            .field("on_stats_changed", &self.on_stats_changed.is_some())
            .field("userdata", &self.userdata.is_some())
            .finish()
    }
}
