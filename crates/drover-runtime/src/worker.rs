//! Worker threads and the generator that spawns them
//!
//! A worker is one detached OS thread bound to the pool's task queue. Its
//! context is a uniquely-owned heap allocation moved into the thread entry
//! point; the thread drops it on exit. Lock order inside the loop is always
//! queue first, then manifest.
//!
//! Teardown invariant: the workers counter is decremented through a
//! manifest handle cloned out of the context, strictly after the context
//! itself has been dropped. Shutdown observes that counter reaching zero,
//! so the decrement must be the final shared access of the thread.

use crate::attr::ThreadAttr;
use crate::errno::errno_to_pool;
use drover_core::manifest::CounterTarget;
use drover_core::{ddebug, dwarn};
use drover_core::{FailureHook, ManifestGuard, PoolData, PoolResult, Task, TaskQueue};
use nix::time::{clock_gettime, ClockId};
use std::sync::Arc;
use std::time::Duration;

/// Exit code recorded for a task whose closure panicked.
pub const PANIC_EXIT_CODE: i32 = i32::MIN;

/// CPU time consumed so far by the calling thread.
fn thread_cpu_now() -> Duration {
    match clock_gettime(ClockId::CLOCK_THREAD_CPUTIME_ID) {
        Ok(ts) => Duration::new(ts.tv_sec() as u64, ts.tv_nsec() as u32),
        Err(_) => Duration::ZERO,
    }
}

/// Everything one worker thread needs. Owned by the thread after spawn.
pub(crate) struct WorkerContext {
    queue: Arc<TaskQueue>,
    min_threads: usize,
    on_task_failed: Option<FailureHook>,
    pool_data: Option<PoolData>,
}

impl WorkerContext {
    /// Run one extracted task: time it, report failure, tally the result.
    ///
    /// Entered with the busy counter already incremented; neither lock is
    /// held while the work closure runs.
    fn execute(&self, task: Task) {
        let start = thread_cpu_now();
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                task.run(self.pool_data.as_ref())
            }));
        let cpu = thread_cpu_now().checked_sub(start).unwrap_or_default();
        let (code, data) = match outcome {
            Ok((code, data)) => (code, data),
            Err(_) => {
                dwarn!("worker task panicked");
                (PANIC_EXIT_CODE, None)
            }
        };
        if code != 0 {
            if let Some(hook) = &self.on_task_failed {
                hook(code, data.as_ref());
            }
        }
        let mut manifest = self.queue.manifest().acquire();
        manifest.tally_result(code, cpu);
        manifest.decrement(CounterTarget::Busy);
    }

    /// The worker loop: extract-or-wait until shutdown or self-shrink.
    fn run(&self) {
        loop {
            let mut q = self.queue.acquire();
            if self.queue.shutdown_requested() {
                return;
            }
            let mut m = self.queue.manifest().acquire();
            if let Some(task) = self.queue.extract(&mut q, &mut m) {
                drop(q);
                m.increment(CounterTarget::Busy);
                drop(m);
                self.execute(task);
                continue;
            }
            // Queue empty. Above the configured minimum, this worker is
            // surplus and retires instead of waiting.
            if m.count(CounterTarget::Workers) > self.min_threads {
                ddebug!("surplus worker retiring");
                return;
            }
            drop(m);
            self.queue.wait(&mut q);
            if self.queue.shutdown_requested() {
                return;
            }
            let mut m = self.queue.manifest().acquire();
            if let Some(task) = self.queue.extract(&mut q, &mut m) {
                drop(q);
                m.increment(CounterTarget::Busy);
                drop(m);
                self.execute(task);
            }
        }
    }
}

extern "C" fn worker_trampoline(arg: *mut libc::c_void) -> *mut libc::c_void {
    let ctx = unsafe { Box::from_raw(arg as *mut WorkerContext) };
    ctx.run();
    // The workers counter must be the last shared state this thread
    // touches: clone the manifest handle out, drop the context, then
    // decrement through the handle we still own.
    let manifest = ctx.queue.manifest().clone();
    drop(ctx);
    let mut m = manifest.acquire();
    m.decrement(CounterTarget::Workers);
    drop(m);
    std::ptr::null_mut()
}

/// Factory for worker threads.
///
/// Holds the creation attributes built once at pool creation and the shared
/// references every worker receives.
pub(crate) struct Generator {
    attr: ThreadAttr,
    queue: Arc<TaskQueue>,
    min_threads: usize,
    on_task_failed: Option<FailureHook>,
    pool_data: Option<PoolData>,
}

impl Generator {
    pub fn new(
        attr: ThreadAttr,
        queue: Arc<TaskQueue>,
        min_threads: usize,
        on_task_failed: Option<FailureHook>,
        pool_data: Option<PoolData>,
    ) -> Self {
        Self {
            attr,
            queue,
            min_threads,
            on_task_failed,
            pool_data,
        }
    }

    /// Spawn one detached worker.
    ///
    /// The workers counter is incremented here, under the caller's manifest
    /// guard, so concurrent submitters observe pending spawns and the
    /// worker bound holds. On failure the increment is rolled back within
    /// the same critical section and the context is reclaimed.
    pub fn generate(&self, manifest: &mut ManifestGuard<'_>) -> PoolResult<()> {
        let ctx = Box::new(WorkerContext {
            queue: self.queue.clone(),
            min_threads: self.min_threads,
            on_task_failed: self.on_task_failed.clone(),
            pool_data: self.pool_data.clone(),
        });
        manifest.increment(CounterTarget::Workers);
        let raw = Box::into_raw(ctx);
        let mut thread: libc::pthread_t = unsafe { std::mem::zeroed() };
        let code = unsafe {
            libc::pthread_create(
                &mut thread,
                self.attr.as_ptr(),
                worker_trampoline,
                raw as *mut libc::c_void,
            )
        };
        if code != 0 {
            // Reclaim the context; net counter change for this section is zero.
            unsafe { drop(Box::from_raw(raw)) };
            manifest.decrement(CounterTarget::Workers);
            dwarn!("worker spawn failed: {}", code);
            return Err(errno_to_pool(code));
        }
        Ok(())
    }
}
