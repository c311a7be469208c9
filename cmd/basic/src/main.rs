//! Basic drover example
//!
//! Submits a batch of tasks, waits for the pool to drain, and prints the
//! final statistics.
//!
//! # Environment Variables
//!
//! - `DRV_LOG_LEVEL=debug` - set log level (off, error, warn, info, debug, trace)
//! - `DRV_FLUSH_EPRINT=1` - flush debug output immediately
//! - `DRV_MIN_THREADS`, `DRV_MORE_THREADS` - override the worker counts

use drover::{dinfo, Pool, PoolConfig, Task};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// DRV_LOG_LEVEL=debug cargo run -p drover-basic
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== drover basic example ===\n");

    let config = PoolConfig::from_env();
    println!(
        "workers: {} (+{} elastic), queue {} entries",
        config.min_threads, config.more_threads, config.initial_queue
    );

    let pool = Pool::create(config)?;
    let completed = Arc::new(AtomicUsize::new(0));

    for i in 0..16u64 {
        let completed = completed.clone();
        pool.submit(Task::new(move |_, _| {
            // A little fake work.
            std::thread::sleep(std::time::Duration::from_millis(5 * (i % 4)));
            completed.fetch_add(1, Ordering::SeqCst);
            0
        }))?;
    }
    dinfo!("16 tasks submitted");

    pool.wait_for_clear()?;
    println!("\ncompleted: {}", completed.load(Ordering::SeqCst));

    let stats = pool.stats();
    println!("performed: {}", stats.tasks_performed);
    println!("succeeded: {}", stats.tasks_succeeded);
    println!("cpu time:  {:.6}s", stats.cpu_seconds);

    pool.shutdown()?;
    println!("\n=== example complete ===");
    Ok(())
}
