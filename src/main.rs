/*!
 * Kernel Sync - Dual Queue Soak Test
 *
 * Runs producers and consumers against one `LockFreeDualQueue` for a fixed
 * time. Producers inject a known share of corrupted payloads; consumers
 * count what they detect. The run passes iff every produced item was
 * consumed exactly once and every injected failure was detected.
 *
 * Environment variables:
 * - KERNEL_SYNC_SOAK_SECS: run time in seconds (default: 10)
 * - KERNEL_SYNC_PRODUCERS: producer threads (default: 1)
 * - KERNEL_SYNC_CONSUMERS: consumer threads (default: 2)
 * - RUST_LOG / KERNEL_SYNC_TRACE_JSON: see `init_tracing`
 */

use anyhow::{bail, Context, Result};
use kernel_sync::monitoring::span_operation;
use kernel_sync::{init_tracing, CancellationToken, LockFreeDualQueue, SyncConfig};
use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const PAYLOAD: &str = "hello";
const CORRUPTED: &str = "HELLO";
const FAILURE_PERCENT: u32 = 5;
const MAX_PRODUCE_INTERVAL_MS: u64 = 25;
const MAX_CONSUME_TIME_MS: u64 = 25;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    items: u64,
    failures: u64,
}

impl std::ops::AddAssign for Tally {
    fn add_assign(&mut self, other: Self) {
        self.items += other.items;
        self.failures += other.failures;
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} is not a valid value: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn produce(id: usize, queue: &LockFreeDualQueue<&'static str>, stop: &CancellationToken) -> Tally {
    let mut rng = rand::thread_rng();
    let mut tally = Tally::default();

    while !stop.is_cancelled() {
        let payload = if rng.gen_range(0..100) >= FAILURE_PERCENT {
            PAYLOAD
        } else {
            tally.failures += 1;
            CORRUPTED
        };
        queue.enqueue(payload);

        tally.items += 1;
        if tally.items % 100 == 0 {
            info!(producer = id, produced = tally.items, "producer alive");
        }
        thread::sleep(Duration::from_millis(rng.gen_range(0..MAX_PRODUCE_INTERVAL_MS)));
    }
    tally
}

fn consume(id: usize, queue: &LockFreeDualQueue<&'static str>, stop: &CancellationToken) -> Tally {
    let mut rng = rand::thread_rng();
    let mut tally = Tally::default();

    while let Ok(payload) = queue.dequeue_cancellable(stop) {
        if payload != PAYLOAD {
            tally.failures += 1;
            warn!(consumer = id, payload, "corrupted payload detected");
        }

        tally.items += 1;
        if tally.items % 100 == 0 {
            info!(consumer = id, consumed = tally.items, "consumer alive");
        }
        thread::sleep(Duration::from_millis(rng.gen_range(0..=MAX_CONSUME_TIME_MS)));
    }
    tally
}

fn main() -> Result<()> {
    init_tracing();

    let run_time = Duration::from_secs(env_or("KERNEL_SYNC_SOAK_SECS", 10u64)?);
    let producers = env_or("KERNEL_SYNC_PRODUCERS", 1usize)?;
    let consumers = env_or("KERNEL_SYNC_CONSUMERS", 2usize)?;
    if producers == 0 || consumers == 0 {
        bail!("soak test needs at least one producer and one consumer");
    }

    let span = span_operation("dual_queue_soak");
    let _entered = span.enter();
    info!(?run_time, producers, consumers, "starting dual queue soak test");

    let queue = Arc::new(LockFreeDualQueue::with_config(SyncConfig::long_wait()));
    let stop_producers = CancellationToken::new();
    let stop_consumers = CancellationToken::new();

    let consumer_handles = (0..consumers)
        .map(|id| {
            let queue = Arc::clone(&queue);
            let stop = stop_consumers.clone();
            thread::Builder::new()
                .name(format!("consumer-{}", id))
                .spawn(move || consume(id, &queue, &stop))
        })
        .collect::<std::io::Result<Vec<_>>>()
        .context("failed to spawn consumer")?;

    let producer_handles = (0..producers)
        .map(|id| {
            let queue = Arc::clone(&queue);
            let stop = stop_producers.clone();
            thread::Builder::new()
                .name(format!("producer-{}", id))
                .spawn(move || produce(id, &queue, &stop))
        })
        .collect::<std::io::Result<Vec<_>>>()
        .context("failed to spawn producer")?;

    thread::sleep(run_time);

    stop_producers.cancel();
    let mut produced = Tally::default();
    for handle in producer_handles {
        produced += handle
            .join()
            .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;
    }

    while !queue.is_empty() {
        thread::sleep(POLL_INTERVAL);
    }

    stop_consumers.cancel();
    let mut consumed = Tally::default();
    for handle in consumer_handles {
        consumed += handle
            .join()
            .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?;
    }

    info!(
        produced = produced.items,
        consumed = consumed.items,
        injected = produced.failures,
        detected = consumed.failures,
        "soak test finished"
    );

    if produced.items != consumed.items || produced.failures != consumed.failures {
        bail!(
            "soak test failed: produced {}/consumed {}, injected {}/detected {}",
            produced.items,
            consumed.items,
            produced.failures,
            consumed.failures
        );
    }
    info!("soak test passed");
    Ok(())
}
