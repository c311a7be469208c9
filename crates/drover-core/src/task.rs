//! Tasks: opaque units of work submitted to the pool
//!
//! A task couples an optional payload with a work closure. The payload is
//! shared with the caller through `Arc` - the pool only ever borrows it,
//! so ownership stays on the caller's side. A nonzero return code from the
//! work closure marks the task as failed; failures are tallied and reported
//! through the pool's failure hook, never escalated to pool state.

use std::any::Any;
use std::sync::Arc;

/// Opaque per-task payload, shared with the submitting caller.
pub type TaskData = Arc<dyn Any + Send + Sync>;

/// Opaque pool-wide userdata, configured once and passed to every task.
pub type PoolData = Arc<dyn Any + Send + Sync>;

/// Work closure: receives the task payload and the pool userdata, returns
/// an exit code. Zero means success.
pub type WorkFn = Box<dyn FnOnce(Option<&TaskData>, Option<&PoolData>) -> i32 + Send>;

/// Hook invoked when a task returns a nonzero exit code.
///
/// Receives the exit code and the failed task's payload. Invoked on the
/// worker thread that ran the task, outside of any pool lock.
pub type FailureHook = Arc<dyn Fn(i32, Option<&TaskData>) + Send + Sync>;

/// One unit of work.
pub struct Task {
    data: Option<TaskData>,
    work: WorkFn,
}

impl Task {
    /// Create a task with no payload.
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce(Option<&TaskData>, Option<&PoolData>) -> i32 + Send + 'static,
    {
        Self {
            data: None,
            work: Box::new(work),
        }
    }

    /// Create a task carrying a shared payload.
    pub fn with_data<F>(data: TaskData, work: F) -> Self
    where
        F: FnOnce(Option<&TaskData>, Option<&PoolData>) -> i32 + Send + 'static,
    {
        Self {
            data: Some(data),
            work: Box::new(work),
        }
    }

    /// Borrow the payload, if any.
    pub fn data(&self) -> Option<&TaskData> {
        self.data.as_ref()
    }

    /// Run the work closure, consuming the task.
    ///
    /// Returns the exit code and the payload so the caller can hand it to
    /// the failure hook after a nonzero result.
    pub fn run(self, pool_data: Option<&PoolData>) -> (i32, Option<TaskData>) {
        let Task { data, work } = self;
        let code = work(data.as_ref(), pool_data);
        (code, data)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_passes_payload() {
        let payload: TaskData = Arc::new(41usize);
        let task = Task::with_data(payload, |data, _| {
            let n = data
                .and_then(|d| d.downcast_ref::<usize>())
                .copied()
                .unwrap_or(0);
            (n + 1) as i32
        });
        let (code, data) = task.run(None);
        assert_eq!(code, 42);
        assert!(data.is_some());
    }

    #[test]
    fn test_run_passes_pool_data() {
        let pool_data: PoolData = Arc::new("shared".to_string());
        let task = Task::new(|_, pool| {
            if pool.and_then(|p| p.downcast_ref::<String>()).is_some() {
                0
            } else {
                1
            }
        });
        let (code, _) = task.run(Some(&pool_data));
        assert_eq!(code, 0);
    }

    #[test]
    fn test_task_without_data() {
        let task = Task::new(|data, _| if data.is_none() { 0 } else { 1 });
        let (code, data) = task.run(None);
        assert_eq!(code, 0);
        assert!(data.is_none());
    }
}
