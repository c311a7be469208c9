//! The pool orchestrator
//!
//! Owns the manifest, the task queue and the worker generator, and exposes
//! the public lifecycle: create, submit, observe (stats and blocking
//! waits), lock/unlock, shutdown, destroy.
//!
//! Lifecycle states: Running (after the minimum workers are spawned),
//! Running+Locked, ShuttingDown (queue instruction latched), Shutdown,
//! and Destroyed (drop). Shutdown is irreversible.
//!
//! Lock order everywhere: queue first, then manifest.

use crate::attr::ThreadAttr;
use crate::config::PoolConfig;
use crate::worker::Generator;
use drover_core::counter::CounterEvent;
use drover_core::manifest::{CounterTarget, ManifestGuard, Stats, StatsHook};
use drover_core::queue::{OwnedQueueGuard, QueueSettings};
use drover_core::{ddebug, dinfo};
use drover_core::{Manifest, PoolData, PoolError, PoolResult, SubmitError, Task, TaskQueue};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

/// Public statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoolStats {
    /// Live worker threads.
    pub workers_total: usize,
    /// Tasks waiting in the queue.
    pub tasks_queued: usize,
    /// Workers not currently executing a task.
    pub workers_waiting: usize,
    /// Tasks that have finished executing.
    pub tasks_performed: usize,
    /// Tasks that finished with exit code zero.
    pub tasks_succeeded: usize,
    /// Accumulated per-task CPU time, in seconds.
    pub cpu_seconds: f64,
}

impl PoolStats {
    /// No pending tasks and every worker idle.
    pub fn is_clear(&self) -> bool {
        self.tasks_queued == 0 && self.workers_waiting == self.workers_total
    }
}

impl From<Stats> for PoolStats {
    fn from(stats: Stats) -> Self {
        PoolStats {
            workers_total: stats.num_workers,
            tasks_queued: stats.num_queued,
            workers_waiting: stats.num_workers.saturating_sub(stats.num_busy),
            tasks_performed: stats.num_complete,
            tasks_succeeded: stats.num_success,
            cpu_seconds: stats.cpu_time,
        }
    }
}

/// Hook invoked whenever a manifest critical section changes the stats.
pub type StatsChangedHook = Arc<dyn Fn(PoolStats) + Send + Sync>;

/// Pool component a wait can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Workers,
    Busy,
    /// Derived from busy: more busy means fewer waiting.
    Waiting,
    Queued,
}

/// Kind of change a wait blocks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Increment,
    Decrement,
    Zero,
}

struct HeldLock {
    owner: ThreadId,
    /// Held purely for its unlock-on-drop effect.
    _guard: OwnedQueueGuard,
}

/// The worker pool.
pub struct Pool {
    config: PoolConfig,
    manifest: Arc<Manifest>,
    queue: Arc<TaskQueue>,
    generator: Generator,
    running: AtomicBool,
    lock_state: Mutex<Option<HeldLock>>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("running", &self.running.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl Pool {
    /// Validate the configuration, build the manifest, queue and generator,
    /// and spawn the minimum worker count.
    ///
    /// Configuration errors are reported before any thread is spawned; a
    /// spawn failure tears the partial pool down and reports the cause.
    pub fn create(config: PoolConfig) -> PoolResult<Self> {
        config.validate().map_err(PoolError::BadConfig)?;

        let stats_hook: Option<StatsHook> = config.on_stats_changed.clone().map(|hook| {
            Box::new(move |stats: Stats| hook(PoolStats::from(stats))) as StatsHook
        });
        let manifest = Arc::new(Manifest::new(stats_hook));
        let queue = Arc::new(TaskQueue::new(
            manifest.clone(),
            QueueSettings {
                order: config.queue_schedule.extract_order(),
                initial: config.initial_queue,
                grow_by: config.queue_grow_increment,
                shrink_at: config.queue_shrink_threshold,
            },
        ));
        let attr = ThreadAttr::new(
            config.stack_size,
            config.guard_size,
            config.thread_schedule,
            config.contention_scope,
        )?;
        let generator = Generator::new(
            attr,
            queue.clone(),
            config.min_threads,
            config.on_task_failed.clone(),
            config.userdata.clone(),
        );

        let pool = Self {
            manifest,
            queue,
            generator,
            running: AtomicBool::new(true),
            lock_state: Mutex::new(None),
            config,
        };

        for _ in 0..pool.config.min_threads {
            let result = {
                let mut m = pool.manifest.acquire();
                pool.generator.generate(&mut m)
            };
            if let Err(err) = result {
                let _ = pool.shutdown();
                return Err(err);
            }
        }
        dinfo!(
            "pool running: {} workers, up to {} more",
            pool.config.min_threads,
            pool.config.more_threads
        );
        Ok(pool)
    }

    /// Create a pool from [`PoolConfig::new`] defaults.
    pub fn with_defaults() -> PoolResult<Self> {
        Self::create(PoolConfig::new())
    }

    /// The configuration snapshot this pool was created with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Lock-protected statistics snapshot.
    pub fn stats(&self) -> PoolStats {
        PoolStats::from(self.manifest.acquire().stats())
    }

    /// The pool-wide userdata, if configured.
    pub fn userdata(&self) -> Option<PoolData> {
        self.config.userdata.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_locked(&self) -> bool {
        self.lock_state.lock().is_some()
    }

    /// No queued tasks and no busy workers, at this instant.
    pub fn is_clear(&self) -> bool {
        self.stats().is_clear()
    }

    /// Common guard clauses: running, unlocked, not shutting down.
    fn check_operable(&self) -> PoolResult<()> {
        if !self.is_running() {
            return Err(PoolError::IsShutdown);
        }
        if self.is_locked() {
            return Err(PoolError::AlreadyLocked);
        }
        if self.queue.shutdown_requested() {
            return Err(PoolError::ShuttingDown);
        }
        Ok(())
    }

    /// Submit one task.
    ///
    /// Pushes to the queue, then, when the worker count is below
    /// `min_threads + more_threads` and no worker is idle, spawns one
    /// additional worker opportunistically. The error carries whether the
    /// task itself was enqueued before the failure.
    pub fn submit(&self, task: Task) -> Result<(), SubmitError> {
        self.check_operable().map_err(SubmitError::from)?;
        let mut q = self.queue.acquire();
        if self.queue.shutdown_requested() {
            return Err(PoolError::ShuttingDown.into());
        }
        let mut m = self.manifest.acquire();
        self.queue
            .enqueue(&mut q, &mut m, task)
            .map_err(SubmitError::from)?;

        let max_threads = self.config.min_threads + self.config.more_threads;
        let workers = m.count(CounterTarget::Workers);
        let waiting = workers.saturating_sub(m.count(CounterTarget::Busy));
        if workers < max_threads && waiting == 0 {
            if let Err(error) = self.generator.generate(&mut m) {
                return Err(SubmitError {
                    enqueued: true,
                    error,
                });
            }
        }
        Ok(())
    }

    /// Loop a zero-wait until the counter actually reads zero, so a return
    /// means the condition held at that instant.
    fn wait_zero(&self, m: &mut ManifestGuard<'_>, target: CounterTarget) {
        while m.count(target) > 0 {
            m.wait_for(target, CounterEvent::Zero);
        }
    }

    /// Timed counterpart of [`wait_zero`](Self::wait_zero); `false` once
    /// the deadline passes.
    fn timed_wait_zero(
        &self,
        m: &mut ManifestGuard<'_>,
        target: CounterTarget,
        deadline: Instant,
    ) -> bool {
        while m.count(target) > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            m.timed_wait_for(target, CounterEvent::Zero, deadline - now);
        }
        true
    }

    /// Block until the queue is drained and every worker is idle.
    pub fn wait_for_clear(&self) -> PoolResult<()> {
        self.check_operable()?;
        let mut m = self.manifest.acquire();
        self.wait_zero(&mut m, CounterTarget::Queued);
        self.wait_zero(&mut m, CounterTarget::Busy);
        Ok(())
    }

    /// Timed [`wait_for_clear`](Self::wait_for_clear). The budget spans
    /// both waits: time spent draining the queue is subtracted from the
    /// busy-worker wait.
    pub fn timed_wait_for_clear(&self, millis: u64) -> PoolResult<()> {
        self.check_operable()?;
        let deadline = Instant::now() + Duration::from_millis(millis);
        let mut m = self.manifest.acquire();
        if !self.timed_wait_zero(&mut m, CounterTarget::Queued, deadline) {
            return Err(PoolError::Timeout);
        }
        if !self.timed_wait_zero(&mut m, CounterTarget::Busy, deadline) {
            return Err(PoolError::Timeout);
        }
        Ok(())
    }

    /// Block until no tasks remain queued.
    pub fn wait_for_queue_empty(&self) -> PoolResult<()> {
        self.check_operable()?;
        let mut m = self.manifest.acquire();
        self.wait_zero(&mut m, CounterTarget::Queued);
        Ok(())
    }

    /// Timed [`wait_for_queue_empty`](Self::wait_for_queue_empty).
    pub fn timed_wait_for_queue_empty(&self, millis: u64) -> PoolResult<()> {
        self.check_operable()?;
        let deadline = Instant::now() + Duration::from_millis(millis);
        let mut m = self.manifest.acquire();
        if !self.timed_wait_zero(&mut m, CounterTarget::Queued, deadline) {
            return Err(PoolError::Timeout);
        }
        Ok(())
    }

    fn translate_wait(
        component: Component,
        change: Change,
    ) -> PoolResult<(CounterTarget, CounterEvent)> {
        let event = match change {
            Change::Increment => CounterEvent::Increment,
            Change::Decrement => CounterEvent::Decrement,
            Change::Zero => CounterEvent::Zero,
        };
        let pair = match component {
            Component::Workers => (CounterTarget::Workers, event),
            Component::Busy => (CounterTarget::Busy, event),
            Component::Queued => (CounterTarget::Queued, event),
            // Waiting is busy with the direction flipped; a zero wait on it
            // has no backing counter.
            Component::Waiting => match change {
                Change::Increment => (CounterTarget::Busy, CounterEvent::Decrement),
                Change::Decrement => (CounterTarget::Busy, CounterEvent::Increment),
                Change::Zero => return Err(PoolError::UnsupportedWait),
            },
        };
        Ok(pair)
    }

    /// Block until one counter signals one change.
    pub fn wait_for_change(&self, component: Component, change: Change) -> PoolResult<()> {
        self.check_operable()?;
        let (target, event) = Self::translate_wait(component, change)?;
        let mut m = self.manifest.acquire();
        m.wait_for(target, event);
        Ok(())
    }

    /// Timed [`wait_for_change`](Self::wait_for_change).
    pub fn timed_wait_for_change(
        &self,
        component: Component,
        change: Change,
        millis: u64,
    ) -> PoolResult<()> {
        self.check_operable()?;
        let (target, event) = Self::translate_wait(component, change)?;
        let mut m = self.manifest.acquire();
        if m.timed_wait_for(target, event, Duration::from_millis(millis)) {
            Ok(())
        } else {
            Err(PoolError::Timeout)
        }
    }

    /// Hold the queue lock across API calls, excluding all concurrent
    /// submit/wait/shutdown operations until [`unlock`](Self::unlock).
    pub fn lock(&self) -> PoolResult<()> {
        if !self.is_running() {
            return Err(PoolError::IsShutdown);
        }
        if self.is_locked() {
            return Err(PoolError::AlreadyLocked);
        }
        if self.queue.shutdown_requested() {
            return Err(PoolError::ShuttingDown);
        }
        let guard = self.queue.acquire_owned();
        *self.lock_state.lock() = Some(HeldLock {
            owner: std::thread::current().id(),
            _guard: guard,
        });
        Ok(())
    }

    /// Release a lock taken by [`lock`](Self::lock). Only the locking
    /// thread may unlock.
    pub fn unlock(&self) -> PoolResult<()> {
        if !self.is_running() {
            return Err(PoolError::IsShutdown);
        }
        let mut held = self.lock_state.lock();
        match held.as_ref() {
            None => Err(PoolError::NotLocked),
            Some(lock) if lock.owner != std::thread::current().id() => {
                Err(PoolError::LockedElsewhere)
            }
            Some(_) => {
                *held = None;
                Ok(())
            }
        }
    }

    /// Latch the shutdown instruction, wake every worker, and block until
    /// the workers counter reaches zero. Irreversible.
    pub fn shutdown(&self) -> PoolResult<()> {
        if !self.is_running() {
            return Err(PoolError::IsShutdown);
        }
        if self.is_locked() {
            return Err(PoolError::AlreadyLocked);
        }
        if self.queue.shutdown_requested() {
            return Err(PoolError::ShuttingDown);
        }
        {
            let mut q = self.queue.acquire();
            // Lost the race against a concurrent shutdown.
            if self.queue.shutdown_requested() {
                return Err(PoolError::IsShutdown);
            }
            ddebug!("shutdown requested, draining workers");
            self.queue.signal_shutdown(&mut q);
        }
        let mut m = self.manifest.acquire();
        self.wait_zero(&mut m, CounterTarget::Workers);
        drop(m);
        self.running.store(false, Ordering::Release);
        dinfo!("pool shut down");
        Ok(())
    }

    /// Consume a shut-down pool. Attempted on a running pool, the pool is
    /// handed back untouched together with `StillRunning`.
    pub fn destroy(self) -> Result<(), (Self, PoolError)> {
        if self.is_running() {
            return Err((self, PoolError::StillRunning));
        }
        Ok(())
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if self.is_running() {
            // Best-effort teardown: release any held lock so shutdown can
            // take the queue mutex, then drain the workers.
            *self.lock_state.lock() = None;
            let _ = self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueSchedule;
    use std::sync::atomic::AtomicUsize;

    fn small_config(min: usize, more: usize) -> PoolConfig {
        PoolConfig::new().min_threads(min).more_threads(more)
    }

    fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = counter.clone();
        Task::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        })
    }

    fn sleeping_task(millis: u64) -> Task {
        Task::new(move |_, _| {
            std::thread::sleep(Duration::from_millis(millis));
            0
        })
    }

    #[test]
    fn test_submitted_tasks_all_run() {
        let pool = Pool::create(small_config(2, 0)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            pool.submit(counting_task(&counter)).unwrap();
        }
        pool.wait_for_clear().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        let stats = pool.stats();
        assert_eq!(stats.tasks_performed, 10);
        assert_eq!(stats.tasks_succeeded, 10);
        assert!(pool.is_clear());
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_failed_task_counted_and_hooked() {
        let failures = Arc::new(AtomicUsize::new(0));
        let seen = failures.clone();
        let config = small_config(1, 0).on_task_failed(Arc::new(move |code, _| {
            assert_eq!(code, 7);
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let pool = Pool::create(config).unwrap();
        pool.submit(Task::new(|_, _| 7)).unwrap();
        pool.wait_for_clear().unwrap();
        let stats = pool.stats();
        assert_eq!(stats.tasks_performed, 1);
        assert_eq!(stats.tasks_succeeded, 0);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_stats_hook_fires_on_activity() {
        let changes = Arc::new(AtomicUsize::new(0));
        let seen = changes.clone();
        let config = small_config(1, 0).on_stats_changed(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let pool = Pool::create(config).unwrap();
        pool.submit(sleeping_task(1)).unwrap();
        pool.wait_for_clear().unwrap();
        assert!(changes.load(Ordering::SeqCst) >= 1);
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_userdata_reaches_tasks() {
        let config = small_config(1, 0).userdata(Arc::new(41usize));
        let pool = Pool::create(config).unwrap();
        let observed = Arc::new(AtomicUsize::new(0));
        let sink = observed.clone();
        pool.submit(Task::new(move |_, pool_data| {
            let n = pool_data
                .and_then(|d| d.downcast_ref::<usize>())
                .copied()
                .unwrap_or(0);
            sink.store(n + 1, Ordering::SeqCst);
            0
        }))
        .unwrap();
        pool.wait_for_clear().unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 42);
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let pool = Pool::create(small_config(1, 0)).unwrap();
        pool.shutdown().unwrap();
        let err = pool.submit(Task::new(|_, _| 0)).unwrap_err();
        assert!(!err.enqueued);
        assert!(matches!(
            err.error,
            PoolError::IsShutdown | PoolError::ShuttingDown
        ));
        assert_eq!(pool.shutdown(), Err(PoolError::IsShutdown));
    }

    #[test]
    fn test_worker_count_bounded_and_stabilizes() {
        let pool = Pool::create(small_config(1, 2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            pool.submit(counting_task(&counter)).unwrap();
            assert!(pool.stats().workers_total <= 3);
        }
        pool.wait_for_clear().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert!(pool.stats().workers_total <= 3);
        pool.shutdown().unwrap();
        assert_eq!(pool.stats().workers_total, 0);
    }

    #[test]
    fn test_fixed_pool_keeps_min_workers() {
        let pool = Pool::create(small_config(2, 0)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            pool.submit(counting_task(&counter)).unwrap();
        }
        pool.wait_for_clear().unwrap();
        // Give self-shrinking a chance to misfire if it were going to.
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(pool.stats().workers_total, 2);
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_lock_unlock_protocol() {
        let pool = Arc::new(Pool::create(small_config(1, 0)).unwrap());
        pool.lock().unwrap();
        assert!(pool.is_locked());
        assert_eq!(pool.lock(), Err(PoolError::AlreadyLocked));
        assert_eq!(
            pool.submit(Task::new(|_, _| 0)).unwrap_err().error,
            PoolError::AlreadyLocked
        );
        assert_eq!(pool.wait_for_clear(), Err(PoolError::AlreadyLocked));
        assert_eq!(pool.shutdown(), Err(PoolError::AlreadyLocked));

        let remote = pool.clone();
        let from_other_thread = std::thread::spawn(move || remote.unlock())
            .join()
            .unwrap();
        assert_eq!(from_other_thread, Err(PoolError::LockedElsewhere));

        pool.unlock().unwrap();
        assert_eq!(pool.unlock(), Err(PoolError::NotLocked));
        pool.submit(Task::new(|_, _| 0)).unwrap();
        pool.wait_for_clear().unwrap();
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_create_shutdown_destroy_roundtrip() {
        let pool = Pool::create(small_config(2, 0)).unwrap();
        assert!(pool.is_running());
        pool.shutdown().unwrap();
        assert!(!pool.is_running());
        assert_eq!(pool.stats().workers_total, 0);
        assert!(pool.destroy().is_ok());
    }

    #[test]
    fn test_destroy_while_running_returns_pool() {
        let pool = Pool::create(small_config(1, 0)).unwrap();
        let (pool, err) = pool.destroy().unwrap_err();
        assert_eq!(err, PoolError::StillRunning);
        pool.shutdown().unwrap();
        assert!(pool.destroy().is_ok());
    }

    #[test]
    fn test_timed_wait_for_queue_empty() {
        let pool = Pool::create(small_config(1, 0)).unwrap();
        for _ in 0..3 {
            pool.submit(sleeping_task(150)).unwrap();
        }
        assert_eq!(
            pool.timed_wait_for_queue_empty(10),
            Err(PoolError::Timeout)
        );
        pool.timed_wait_for_queue_empty(10_000).unwrap();
        pool.wait_for_clear().unwrap();
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_timed_wait_for_clear_budget() {
        let pool = Pool::create(small_config(1, 0)).unwrap();
        pool.submit(sleeping_task(300)).unwrap();
        assert_eq!(pool.timed_wait_for_clear(20), Err(PoolError::Timeout));
        pool.timed_wait_for_clear(10_000).unwrap();
        assert!(pool.is_clear());
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_waiting_zero_wait_is_unsupported() {
        let pool = Pool::create(small_config(1, 0)).unwrap();
        assert_eq!(
            pool.wait_for_change(Component::Waiting, Change::Zero),
            Err(PoolError::UnsupportedWait)
        );
        assert_eq!(
            pool.timed_wait_for_change(Component::Waiting, Change::Zero, 10),
            Err(PoolError::UnsupportedWait)
        );
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_timed_wait_for_change_sees_queue_grow() {
        let pool = Arc::new(Pool::create(small_config(1, 0)).unwrap());
        let waiter = {
            let pool = pool.clone();
            std::thread::spawn(move || {
                pool.timed_wait_for_change(Component::Queued, Change::Increment, 5_000)
            })
        };
        std::thread::sleep(Duration::from_millis(100));
        pool.submit(sleeping_task(1)).unwrap();
        assert!(waiter.join().unwrap().is_ok());
        pool.wait_for_clear().unwrap();
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_random_schedule_runs_everything() {
        let config = small_config(2, 0).queue_schedule(QueueSchedule::Random);
        let pool = Pool::create(config).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..32 {
            pool.submit(counting_task(&counter)).unwrap();
        }
        pool.wait_for_clear().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 32);
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_dropping_running_pool_shuts_down() {
        let pool = Pool::create(small_config(1, 0)).unwrap();
        pool.submit(sleeping_task(10)).unwrap();
        drop(pool);
    }

    #[test]
    fn test_bad_config_rejected_before_spawn() {
        let err = Pool::create(small_config(0, 0)).unwrap_err();
        assert!(matches!(err, PoolError::BadConfig(_)));
    }
}
