//! Condition-variable-backed event counters
//!
//! A `Counter` is a trio of condition variables signaling changes to one
//! integer: "incremented", "decremented" and "reached zero". The integer
//! itself lives inside the owning manifest's mutex state; every mutation
//! and wait happens with that lock already held by the caller. The counter
//! never takes a lock of its own.

use parking_lot::{Condvar, MutexGuard};
use std::time::Duration;

/// Events a counter can signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterEvent {
    /// The count went up by one.
    Increment,
    /// The count went down by one.
    Decrement,
    /// The count went down to exactly zero.
    Zero,
}

/// Condition-variable trio for one guarded count.
///
/// The count is passed in by the caller, borrowed out of the state that the
/// surrounding mutex protects.
pub struct Counter {
    incremented: Condvar,
    decremented: Condvar,
    zeroed: Condvar,
}

impl Counter {
    pub const fn new() -> Self {
        Self {
            incremented: Condvar::new(),
            decremented: Condvar::new(),
            zeroed: Condvar::new(),
        }
    }

    /// Bump the count and broadcast the increment event.
    ///
    /// The caller must hold the lock guarding `count`.
    pub fn increment(&self, count: &mut usize) {
        *count += 1;
        self.incremented.notify_all();
    }

    /// Drop the count by one and broadcast the decrement event; when the
    /// count reaches zero, additionally broadcast the zero event.
    ///
    /// No-op at zero. The caller must hold the lock guarding `count`.
    pub fn decrement(&self, count: &mut usize) {
        if *count == 0 {
            return;
        }
        *count -= 1;
        self.decremented.notify_all();
        if *count == 0 {
            self.zeroed.notify_all();
        }
    }

    /// Block until the given event is signaled, releasing the held lock for
    /// the duration of the wait.
    ///
    /// Waiting for `Zero` with the count already at zero returns without
    /// blocking. `current` is the count observed under the held lock.
    pub fn wait_for<T: ?Sized>(
        &self,
        event: CounterEvent,
        current: usize,
        guard: &mut MutexGuard<'_, T>,
    ) {
        match event {
            CounterEvent::Increment => self.incremented.wait(guard),
            CounterEvent::Decrement => self.decremented.wait(guard),
            CounterEvent::Zero => {
                if current != 0 {
                    self.zeroed.wait(guard);
                }
            }
        }
    }

    /// Like [`wait_for`](Self::wait_for) with a deadline.
    ///
    /// Returns `true` if the event was signaled before the timeout. A timed
    /// wait for `Zero` at count zero succeeds immediately.
    pub fn timed_wait_for<T: ?Sized>(
        &self,
        event: CounterEvent,
        current: usize,
        guard: &mut MutexGuard<'_, T>,
        timeout: Duration,
    ) -> bool {
        let condvar = match event {
            CounterEvent::Increment => &self.incremented,
            CounterEvent::Decrement => &self.decremented,
            CounterEvent::Zero => {
                if current == 0 {
                    return true;
                }
                &self.zeroed
            }
        };
        !condvar.wait_for(guard, timeout).timed_out()
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}
