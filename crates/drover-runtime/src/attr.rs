//! Thread creation attributes
//!
//! RAII wrapper over `pthread_attr_t`. Built once at pool creation from the
//! validated configuration and reused for every worker the generator
//! spawns. Workers are always created detached: nothing ever joins them;
//! shutdown observes the manifest's workers counter instead.

use crate::config::{ContentionScope, SchedulePolicy};
use crate::errno::errno_to_pool;
use drover_core::PoolResult;

/// Owned thread-creation attribute set.
pub struct ThreadAttr {
    raw: libc::pthread_attr_t,
}

impl ThreadAttr {
    /// Initialize attributes with the given stack size, guard size,
    /// scheduling policy and contention scope.
    pub fn new(
        stack_size: usize,
        guard_size: usize,
        policy: SchedulePolicy,
        scope: ContentionScope,
    ) -> PoolResult<Self> {
        unsafe {
            let mut raw: libc::pthread_attr_t = std::mem::zeroed();
            let code = libc::pthread_attr_init(&mut raw);
            if code != 0 {
                return Err(errno_to_pool(code));
            }
            libc::pthread_attr_setstacksize(&mut raw, stack_size);
            libc::pthread_attr_setguardsize(&mut raw, guard_size);
            match policy {
                SchedulePolicy::Default => {}
                SchedulePolicy::Fifo => {
                    libc::pthread_attr_setschedpolicy(&mut raw, libc::SCHED_FIFO);
                }
                SchedulePolicy::RoundRobin => {
                    libc::pthread_attr_setschedpolicy(&mut raw, libc::SCHED_RR);
                }
            }
            match scope {
                ContentionScope::Default => {}
                ContentionScope::Process => {
                    crate::pthread_scope::pthread_attr_setscope(
                        &mut raw,
                        crate::pthread_scope::PTHREAD_SCOPE_PROCESS,
                    );
                }
                ContentionScope::System => {
                    crate::pthread_scope::pthread_attr_setscope(
                        &mut raw,
                        crate::pthread_scope::PTHREAD_SCOPE_SYSTEM,
                    );
                }
            }
            libc::pthread_attr_setdetachstate(&mut raw, libc::PTHREAD_CREATE_DETACHED);
            Ok(Self { raw })
        }
    }

    pub(crate) fn as_ptr(&self) -> *const libc::pthread_attr_t {
        &self.raw
    }
}

impl Drop for ThreadAttr {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_attr_destroy(&mut self.raw);
        }
    }
}
