//! The task queue
//!
//! A dynamically-sized sequence of pending tasks behind its own mutex and
//! condition variable. Capacity is managed explicitly: the backing storage
//! grows by a fixed increment when full and is compacted back to the live
//! count once the unused slack reaches the shrink threshold. Extraction
//! order is either FIFO or a uniformly random index.
//!
//! The queue keeps the manifest's "queued" counter synchronized with its
//! contents: enqueue and extract take the caller's manifest guard so both
//! sides move in one critical section. Lock order is always queue first,
//! then manifest.

use crate::error::{PoolError, PoolResult};
use crate::manifest::{CounterTarget, Manifest, ManifestGuard};
use crate::task::Task;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Condvar, Mutex, MutexGuard, RawMutex};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which pending task `extract` selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOrder {
    /// Oldest task first.
    Fifo,
    /// Uniformly random pending task.
    Random,
}

/// Queue sizing and scheduling parameters.
#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    pub order: ExtractOrder,
    /// Initial backing capacity.
    pub initial: usize,
    /// Entries added per growth step.
    pub grow_by: usize,
    /// Slack (capacity minus live count) that triggers compaction.
    pub shrink_at: usize,
}

/// State behind the queue lock.
pub struct QueueState {
    tasks: Vec<Task>,
}

/// Held queue lock.
pub type QueueGuard<'a> = MutexGuard<'a, QueueState>;

/// Owned queue lock, held across API calls by [`Pool::lock`].
///
/// [`Pool::lock`]: ../../drover_runtime/pool/struct.Pool.html#method.lock
pub type OwnedQueueGuard = ArcMutexGuard<RawMutex, QueueState>;

/// The pool's pending-task queue.
pub struct TaskQueue {
    state: Arc<Mutex<QueueState>>,
    available: Condvar,
    manifest: Arc<Manifest>,
    order: ExtractOrder,
    grow_by: usize,
    shrink_at: usize,
    /// Latches proceed -> shutdown exactly once; written under the queue
    /// lock, readable anywhere.
    shutdown: AtomicBool,
}

impl TaskQueue {
    pub fn new(manifest: Arc<Manifest>, settings: QueueSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                tasks: Vec::with_capacity(settings.initial),
            })),
            available: Condvar::new(),
            manifest,
            order: settings.order,
            grow_by: settings.grow_by,
            shrink_at: settings.shrink_at,
            shutdown: AtomicBool::new(false),
        }
    }

    /// The manifest this queue keeps its "queued" counter synchronized with.
    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    /// Take the queue lock.
    pub fn acquire(&self) -> QueueGuard<'_> {
        self.state.lock()
    }

    /// Take the queue lock as an owned guard that can outlive the borrow,
    /// for holding across API calls.
    pub fn acquire_owned(&self) -> OwnedQueueGuard {
        Mutex::lock_arc(&self.state)
    }

    /// Number of pending tasks.
    pub fn len(&self, guard: &QueueGuard<'_>) -> usize {
        guard.tasks.len()
    }

    pub fn is_empty(&self, guard: &QueueGuard<'_>) -> bool {
        guard.tasks.is_empty()
    }

    /// Append a task, growing the backing storage by the configured
    /// increment when full. On success the manifest's "queued" counter is
    /// incremented and exactly one waiter is signaled.
    ///
    /// A failed growth allocation reports `NoMemory` and leaves the queue
    /// unchanged.
    pub fn enqueue(
        &self,
        guard: &mut QueueGuard<'_>,
        manifest: &mut ManifestGuard<'_>,
        task: Task,
    ) -> PoolResult<()> {
        let tasks = &mut guard.tasks;
        if tasks.len() == tasks.capacity() {
            tasks
                .try_reserve_exact(self.grow_by)
                .map_err(|_| PoolError::NoMemory)?;
        }
        tasks.push(task);
        manifest.increment(CounterTarget::Queued);
        self.available.notify_one();
        Ok(())
    }

    /// Remove and return one task, or `None` on an empty queue.
    ///
    /// FIFO order takes index 0; random order a uniform index. Remaining
    /// entries keep their relative order. Decrements the manifest's
    /// "queued" counter, and compacts the backing storage once slack
    /// reaches the shrink threshold.
    pub fn extract(
        &self,
        guard: &mut QueueGuard<'_>,
        manifest: &mut ManifestGuard<'_>,
    ) -> Option<Task> {
        if guard.tasks.is_empty() {
            return None;
        }
        let index = match self.order {
            ExtractOrder::Fifo => 0,
            ExtractOrder::Random => rand::thread_rng().gen_range(0..guard.tasks.len()),
        };
        let task = guard.tasks.remove(index);
        if guard.tasks.capacity() - guard.tasks.len() >= self.shrink_at {
            guard.tasks.shrink_to_fit();
        }
        manifest.decrement(CounterTarget::Queued);
        Some(task)
    }

    /// Block on the queue's condition variable. The signal carries no
    /// payload: wakers re-check the shutdown latch and re-attempt
    /// extraction.
    pub fn wait(&self, guard: &mut QueueGuard<'_>) {
        self.available.wait(guard);
    }

    /// Whether the proceed -> shutdown latch has flipped.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Flip the shutdown latch and wake every blocked worker. The caller
    /// must hold the queue lock so the latch cannot race a worker between
    /// its check and its wait.
    pub fn signal_shutdown(&self, _guard: &mut QueueGuard<'_>) {
        self.shutdown.store(true, Ordering::Release);
        self.available.notify_all();
    }

    #[cfg(test)]
    fn capacity(&self, guard: &QueueGuard<'_>) -> usize {
        guard.tasks.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_with(order: ExtractOrder, initial: usize, shrink_at: usize) -> TaskQueue {
        let manifest = Arc::new(Manifest::new(None));
        TaskQueue::new(
            manifest,
            QueueSettings {
                order,
                initial,
                grow_by: 4,
                shrink_at,
            },
        )
    }

    fn tagged(tag: usize) -> Task {
        Task::with_data(Arc::new(tag), |data, _| {
            data.and_then(|d| d.downcast_ref::<usize>())
                .map(|n| *n as i32)
                .unwrap_or(-1)
        })
    }

    fn tag_of(task: Task) -> usize {
        let (code, _) = task.run(None);
        code as usize
    }

    #[test]
    fn test_fifo_extraction_order() {
        let queue = queue_with(ExtractOrder::Fifo, 8, 64);
        let manifest = queue.manifest().clone();
        let mut q = queue.acquire();
        let mut m = manifest.acquire();
        for i in 0..5 {
            queue.enqueue(&mut q, &mut m, tagged(i)).unwrap();
        }
        for i in 0..5 {
            let task = queue.extract(&mut q, &mut m).unwrap();
            assert_eq!(tag_of(task), i);
        }
        assert!(queue.extract(&mut q, &mut m).is_none());
    }

    #[test]
    fn test_random_extraction_yields_every_task() {
        let queue = queue_with(ExtractOrder::Random, 8, 64);
        let manifest = queue.manifest().clone();
        let mut q = queue.acquire();
        let mut m = manifest.acquire();
        for i in 0..8 {
            queue.enqueue(&mut q, &mut m, tagged(i)).unwrap();
        }
        let mut seen = Vec::new();
        while let Some(task) = queue.extract(&mut q, &mut m) {
            seen.push(tag_of(task));
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_queued_counter_tracks_contents() {
        let queue = queue_with(ExtractOrder::Fifo, 4, 64);
        let manifest = queue.manifest().clone();
        let mut q = queue.acquire();
        let mut m = manifest.acquire();
        for i in 0..3 {
            queue.enqueue(&mut q, &mut m, tagged(i)).unwrap();
        }
        assert_eq!(m.count(CounterTarget::Queued), 3);
        assert_eq!(queue.len(&q), 3);
        queue.extract(&mut q, &mut m);
        assert_eq!(m.count(CounterTarget::Queued), 2);
        assert_eq!(queue.len(&q), 2);
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let queue = queue_with(ExtractOrder::Fifo, 2, 64);
        let manifest = queue.manifest().clone();
        let mut q = queue.acquire();
        let mut m = manifest.acquire();
        for i in 0..10 {
            queue.enqueue(&mut q, &mut m, tagged(i)).unwrap();
        }
        assert_eq!(queue.len(&q), 10);
        assert!(queue.capacity(&q) >= 10);
    }

    #[test]
    fn test_compacts_once_slack_reaches_threshold() {
        let queue = queue_with(ExtractOrder::Fifo, 8, 4);
        let manifest = queue.manifest().clone();
        let mut q = queue.acquire();
        let mut m = manifest.acquire();
        for i in 0..8 {
            queue.enqueue(&mut q, &mut m, tagged(i)).unwrap();
        }
        // Draining builds slack; once it reaches the threshold the backing
        // storage snaps back to the live count.
        for _ in 0..4 {
            queue.extract(&mut q, &mut m);
        }
        assert_eq!(queue.capacity(&q), queue.len(&q));
        // Draining the rest frees the storage entirely.
        while queue.extract(&mut q, &mut m).is_some() {}
        assert_eq!(queue.len(&q), 0);
        assert_eq!(queue.capacity(&q), 0);
    }

    #[test]
    fn test_shutdown_latch() {
        let queue = queue_with(ExtractOrder::Fifo, 4, 64);
        assert!(!queue.shutdown_requested());
        let mut q = queue.acquire();
        queue.signal_shutdown(&mut q);
        drop(q);
        assert!(queue.shutdown_requested());
    }
}
