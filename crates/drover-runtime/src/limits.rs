//! System-limit and thread-default queries
//!
//! Thin wrappers over sysconf, default pthread attributes and rlimits.
//! The orchestrator consults these during configuration validation; none of
//! them carry pool-specific logic.

use nix::sys::resource::{getrlimit, Resource, RLIM_INFINITY};

/// Size of one memory page in bytes.
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

/// Number of processors currently online. At least 1.
pub fn hardware_concurrency() -> usize {
    let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if count > 0 {
        count as usize
    } else {
        1
    }
}

/// Smallest stack this library accepts: the pthread minimum plus one page
/// of working room.
pub fn min_stack() -> usize {
    libc::PTHREAD_STACK_MIN as usize + page_size()
}

/// The platform's default thread stack size.
pub fn sys_default_stack() -> usize {
    unsafe {
        let mut attr: libc::pthread_attr_t = std::mem::zeroed();
        if libc::pthread_attr_init(&mut attr) != 0 {
            return 0;
        }
        let mut size: libc::size_t = 0;
        libc::pthread_attr_getstacksize(&attr, &mut size);
        libc::pthread_attr_destroy(&mut attr);
        size
    }
}

/// The platform's default guard region size.
pub fn sys_default_guard() -> usize {
    unsafe {
        let mut attr: libc::pthread_attr_t = std::mem::zeroed();
        if libc::pthread_attr_init(&mut attr) != 0 {
            return 0;
        }
        let mut size: libc::size_t = 0;
        libc::pthread_attr_getguardsize(&attr, &mut size);
        libc::pthread_attr_destroy(&mut attr);
        size
    }
}

/// The guard size this library defaults to: one page.
pub fn default_guard() -> usize {
    page_size()
}

/// Round a stack size up to the next page-size multiple.
pub fn rounded_stack(stack_size: usize) -> usize {
    let page = page_size();
    match stack_size % page {
        0 => stack_size,
        rem => stack_size + (page - rem),
    }
}

/// Whether the host supports process contention scope for threads.
pub fn proc_scope_supported() -> bool {
    unsafe {
        let mut attr: libc::pthread_attr_t = std::mem::zeroed();
        if libc::pthread_attr_init(&mut attr) != 0 {
            return false;
        }
        let result = crate::pthread_scope::pthread_attr_setscope(
            &mut attr,
            crate::pthread_scope::PTHREAD_SCOPE_PROCESS,
        );
        libc::pthread_attr_destroy(&mut attr);
        result != libc::ENOTSUP
    }
}

/// Stack-memory rlimit as (soft, hard). Query failure reads as unlimited.
pub fn max_stack_rlimit() -> (u64, u64) {
    getrlimit(Resource::RLIMIT_STACK).unwrap_or((RLIM_INFINITY, RLIM_INFINITY))
}

/// Address-space rlimit as (soft, hard).
pub fn max_memory_rlimit() -> (u64, u64) {
    getrlimit(Resource::RLIMIT_AS).unwrap_or((RLIM_INFINITY, RLIM_INFINITY))
}

/// Process/thread-count rlimit as (soft, hard).
pub fn max_threads_rlimit() -> (u64, u64) {
    getrlimit(Resource::RLIMIT_NPROC).unwrap_or((RLIM_INFINITY, RLIM_INFINITY))
}

/// Whether an rlimit value means "no limit".
pub fn limit_is_unlimited(limit: u64) -> bool {
    limit == RLIM_INFINITY
}

/// Whether `value` exceeds a (possibly unlimited) rlimit.
pub fn value_exceeds_limit(value: u64, limit: u64) -> bool {
    if limit_is_unlimited(limit) {
        return false;
    }
    limit < value
}

/// Stack memory needed to run `num_threads` minimum-stack threads.
pub fn required_stack_for(num_threads: usize) -> usize {
    min_stack().saturating_mul(num_threads)
}

/// How many threads of the given stack and guard size fit inside the soft
/// stack rlimit.
pub fn most_threads_for(stack_size: usize, guard_size: usize) -> usize {
    let (soft, _) = max_stack_rlimit();
    if limit_is_unlimited(soft) {
        return usize::MAX;
    }
    let per_thread = (stack_size + guard_size) as u64;
    if per_thread == 0 {
        return usize::MAX;
    }
    (soft / per_thread) as usize
}
