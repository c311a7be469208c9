//! Mapping from pthread/errno codes to the pool error taxonomy

use drover_core::PoolError;
use nix::errno::Errno;

/// Translate a nonzero pthread return code or errno value.
pub fn errno_to_pool(code: i32) -> PoolError {
    match Errno::from_raw(code) {
        Errno::EINVAL => PoolError::BadArgument,
        Errno::EAGAIN => PoolError::SystemResources,
        Errno::ENOMEM => PoolError::NoMemory,
        Errno::EPERM => PoolError::NoPermission,
        _ => PoolError::Unknown,
    }
}
