//! drover stress exercise
//!
//! Hammers an elastic pool with random-order extraction: bursts of mixed
//! fast/slow tasks, interleaved with timed waits, then a clean shutdown.
//! Watch the worker count grow to min+more under pressure and fall back to
//! min when the pool idles.

use drover::{Change, Component, Pool, PoolConfig, PoolError, QueueSchedule, Task};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const BURSTS: usize = 8;
const TASKS_PER_BURST: usize = 64;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PoolConfig::from_env()
        .min_threads(2)
        .more_threads(6)
        .queue_schedule(QueueSchedule::Random);
    let max_workers = config.min_threads + config.more_threads;

    let pool = Pool::create(config)?;
    let completed = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    for burst in 0..BURSTS {
        for i in 0..TASKS_PER_BURST {
            let completed = completed.clone();
            let failed = failed.clone();
            pool.submit(Task::new(move |_, _| {
                if i % 16 == 0 {
                    std::thread::sleep(Duration::from_millis(2));
                }
                completed.fetch_add(1, Ordering::SeqCst);
                // Every 32nd task reports a failure code on purpose.
                if i % 32 == 7 {
                    failed.fetch_add(1, Ordering::SeqCst);
                    1
                } else {
                    0
                }
            }))?;
        }

        let stats = pool.stats();
        assert!(stats.workers_total <= max_workers);
        println!(
            "burst {}: queued={} workers={} busy={}",
            burst,
            stats.tasks_queued,
            stats.workers_total,
            stats.workers_total - stats.workers_waiting
        );

        // Exercise the timed waits: a tiny budget may time out, the retry
        // with a generous one must not.
        match pool.timed_wait_for_queue_empty(1) {
            Ok(()) => {}
            Err(PoolError::Timeout) => pool.timed_wait_for_queue_empty(60_000)?,
            Err(err) => return Err(err.into()),
        }
    }

    // One demonstration of an edge wait: a short window for some worker to
    // go idle. An already-idle pool produces no edge, so timeout is fine.
    pool.timed_wait_for_change(Component::Waiting, Change::Increment, 100)
        .or_else(|err| if err == PoolError::Timeout { Ok(()) } else { Err(err) })?;

    pool.wait_for_clear()?;
    let stats = pool.stats();
    println!(
        "\n{} tasks in {:?}: performed={} succeeded={} cpu={:.4}s",
        BURSTS * TASKS_PER_BURST,
        start.elapsed(),
        stats.tasks_performed,
        stats.tasks_succeeded,
        stats.cpu_seconds,
    );
    assert_eq!(completed.load(Ordering::SeqCst), BURSTS * TASKS_PER_BURST);
    assert_eq!(
        stats.tasks_performed - stats.tasks_succeeded,
        failed.load(Ordering::SeqCst)
    );

    pool.shutdown()?;
    println!("shutdown clean, workers drained");
    Ok(())
}
