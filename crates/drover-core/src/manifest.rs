//! The manifest: lock-guarded aggregate of pool-wide statistics
//!
//! One mutex guards three event counters (workers, busy, queued) plus the
//! completion tallies, so a caller can atomically test or wait across them.
//! Releasing the manifest runs the edge-triggered change protocol: the new
//! snapshot is compared field-by-field against the one captured at the
//! previous release, and the stats-changed hook fires at most once per
//! critical section, only when something actually moved.

use crate::counter::{Counter, CounterEvent};
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;

/// Snapshot of the manifest's aggregate state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    /// Live worker threads.
    pub num_workers: usize,
    /// Workers currently executing a task.
    pub num_busy: usize,
    /// Tasks waiting in the queue.
    pub num_queued: usize,
    /// Tasks that have finished executing, success or not.
    pub num_complete: usize,
    /// Tasks that finished with exit code zero.
    pub num_success: usize,
    /// Accumulated per-task CPU time, in seconds. Monotone.
    pub cpu_time: f64,
}

/// Which of the manifest's counters an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterTarget {
    Workers,
    Busy,
    Queued,
}

/// Hook invoked (with the manifest lock held) whenever a critical section
/// leaves the aggregate stats different from before.
///
/// The hook must not reenter pool operations.
pub type StatsHook = Box<dyn Fn(Stats) + Send + Sync>;

#[derive(Default)]
struct ManifestState {
    workers: usize,
    busy: usize,
    queued: usize,
    complete: usize,
    success: usize,
    cpu_seconds: f64,
    /// Snapshot captured at the previous release.
    previous: Stats,
}

impl ManifestState {
    fn snapshot(&self) -> Stats {
        Stats {
            num_workers: self.workers,
            num_busy: self.busy,
            num_queued: self.queued,
            num_complete: self.complete,
            num_success: self.success,
            cpu_time: self.cpu_seconds,
        }
    }
}

/// The pool's statistics aggregate.
pub struct Manifest {
    state: Mutex<ManifestState>,
    workers_events: Counter,
    busy_events: Counter,
    queued_events: Counter,
    on_stats_changed: Option<StatsHook>,
}

impl Manifest {
    /// Create a manifest. The previous-snapshot seed is the all-zero state
    /// the pool starts in.
    pub fn new(on_stats_changed: Option<StatsHook>) -> Self {
        Self {
            state: Mutex::new(ManifestState::default()),
            workers_events: Counter::new(),
            busy_events: Counter::new(),
            queued_events: Counter::new(),
            on_stats_changed,
        }
    }

    /// Enter a critical section. Dropping the returned guard releases the
    /// manifest and runs the edge-triggered change notification.
    pub fn acquire(&self) -> ManifestGuard<'_> {
        ManifestGuard {
            manifest: self,
            state: self.state.lock(),
        }
    }

    fn counter(&self, target: CounterTarget) -> &Counter {
        match target {
            CounterTarget::Workers => &self.workers_events,
            CounterTarget::Busy => &self.busy_events,
            CounterTarget::Queued => &self.queued_events,
        }
    }
}

/// Held manifest lock.
pub struct ManifestGuard<'a> {
    manifest: &'a Manifest,
    state: MutexGuard<'a, ManifestState>,
}

impl ManifestGuard<'_> {
    /// Current value of one counter.
    pub fn count(&self, target: CounterTarget) -> usize {
        match target {
            CounterTarget::Workers => self.state.workers,
            CounterTarget::Busy => self.state.busy,
            CounterTarget::Queued => self.state.queued,
        }
    }

    /// Snapshot of the aggregate state.
    pub fn stats(&self) -> Stats {
        self.state.snapshot()
    }

    /// Increment one counter, broadcasting its increment event.
    pub fn increment(&mut self, target: CounterTarget) {
        let counter = self.manifest.counter(target);
        let count = match target {
            CounterTarget::Workers => &mut self.state.workers,
            CounterTarget::Busy => &mut self.state.busy,
            CounterTarget::Queued => &mut self.state.queued,
        };
        counter.increment(count);
    }

    /// Decrement one counter, broadcasting its decrement (and possibly
    /// zero) event. No-op at zero.
    pub fn decrement(&mut self, target: CounterTarget) {
        let counter = self.manifest.counter(target);
        let count = match target {
            CounterTarget::Workers => &mut self.state.workers,
            CounterTarget::Busy => &mut self.state.busy,
            CounterTarget::Queued => &mut self.state.queued,
        };
        counter.decrement(count);
    }

    /// Record a finished task: bumps the completion count, accumulates CPU
    /// time, and bumps the success count iff the exit code is zero.
    pub fn tally_result(&mut self, code: i32, cpu: Duration) {
        self.state.complete += 1;
        self.state.cpu_seconds += cpu.as_secs_f64();
        if code == 0 {
            self.state.success += 1;
        }
    }

    /// Block until `target` signals `event`, releasing the manifest lock
    /// for the duration of the wait.
    pub fn wait_for(&mut self, target: CounterTarget, event: CounterEvent) {
        let current = self.count(target);
        self.manifest
            .counter(target)
            .wait_for(event, current, &mut self.state);
    }

    /// Timed variant of [`wait_for`](Self::wait_for). Returns `true` if the
    /// event occurred before the deadline.
    pub fn timed_wait_for(
        &mut self,
        target: CounterTarget,
        event: CounterEvent,
        timeout: Duration,
    ) -> bool {
        let current = self.count(target);
        self.manifest
            .counter(target)
            .timed_wait_for(event, current, &mut self.state, timeout)
    }
}

impl Drop for ManifestGuard<'_> {
    fn drop(&mut self) {
        if let Some(hook) = &self.manifest.on_stats_changed {
            let after = self.state.snapshot();
            if after != self.state.previous {
                hook(after);
                self.state.previous = after;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_counts_move_under_guard() {
        let manifest = Manifest::new(None);
        let mut guard = manifest.acquire();
        guard.increment(CounterTarget::Workers);
        guard.increment(CounterTarget::Workers);
        guard.increment(CounterTarget::Busy);
        guard.decrement(CounterTarget::Workers);
        assert_eq!(guard.count(CounterTarget::Workers), 1);
        assert_eq!(guard.count(CounterTarget::Busy), 1);
        assert_eq!(guard.count(CounterTarget::Queued), 0);
    }

    #[test]
    fn test_tally_result() {
        let manifest = Manifest::new(None);
        let mut guard = manifest.acquire();
        guard.tally_result(0, Duration::from_millis(250));
        guard.tally_result(3, Duration::from_millis(750));
        let stats = guard.stats();
        assert_eq!(stats.num_complete, 2);
        assert_eq!(stats.num_success, 1);
        assert!((stats.cpu_time - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_hook_is_edge_triggered() {
        let fired = Arc::new(AtomicUsize::new(0));
        let seen = fired.clone();
        let manifest = Manifest::new(Some(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })));

        // No change: no notification.
        drop(manifest.acquire());
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // One change: exactly one notification for the whole section.
        {
            let mut guard = manifest.acquire();
            guard.increment(CounterTarget::Workers);
            guard.increment(CounterTarget::Queued);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // A section that nets out to the previous snapshot stays silent.
        {
            let mut guard = manifest.acquire();
            guard.increment(CounterTarget::Busy);
            guard.decrement(CounterTarget::Busy);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_sees_latest_snapshot() {
        let observed = Arc::new(Mutex::new(Stats::default()));
        let sink = observed.clone();
        let manifest = Manifest::new(Some(Box::new(move |stats| {
            *sink.lock() = stats;
        })));
        {
            let mut guard = manifest.acquire();
            guard.increment(CounterTarget::Queued);
            guard.tally_result(0, Duration::ZERO);
        }
        let stats = *observed.lock();
        assert_eq!(stats.num_queued, 1);
        assert_eq!(stats.num_complete, 1);
        assert_eq!(stats.num_success, 1);
    }

    #[test]
    fn test_timed_zero_wait_at_zero() {
        let manifest = Manifest::new(None);
        let mut guard = manifest.acquire();
        assert!(guard.timed_wait_for(
            CounterTarget::Queued,
            CounterEvent::Zero,
            Duration::from_secs(5)
        ));
    }
}
