/*!
 * Dual Queue Tests
 */

use kernel_sync::{CancellationToken, LockFreeDualQueue, SyncConfig, Timeout};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_waiting_consumers_fulfilled_in_arrival_order() {
    let queue = Arc::new(LockFreeDualQueue::with_config(SyncConfig::low_latency()));

    let first = {
        let queue = queue.clone();
        thread::spawn(move || queue.dequeue())
    };
    thread::sleep(Duration::from_millis(50));
    let second = {
        let queue = queue.clone();
        thread::spawn(move || queue.dequeue())
    };
    thread::sleep(Duration::from_millis(50));
    assert!(queue.is_empty());

    queue.enqueue(1);
    queue.enqueue(2);
    assert_eq!(first.join().unwrap(), 1);
    assert_eq!(second.join().unwrap(), 2);
    assert!(queue.is_empty());
}

#[test]
fn test_withdrawn_requests_never_swallow_data() {
    let queue = LockFreeDualQueue::new();
    let token = CancellationToken::new();
    token.cancel();

    for _ in 0..5 {
        assert_eq!(queue.dequeue_timeout(Duration::from_millis(5)), None);
        assert!(queue.dequeue_cancellable(&token).unwrap_err().is_cancelled());
    }

    queue.enqueue("kept");
    assert_eq!(queue.try_dequeue(), Some("kept"));
    assert_eq!(queue.dequeue_timeout(Timeout::NoWait), None);
}

#[test]
fn test_producers_and_consumers_balance() {
    const PRODUCERS: usize = 2;
    const CONSUMERS: usize = 3;
    const PER_PRODUCER: usize = 2_000;

    let queue = Arc::new(LockFreeDualQueue::with_config(SyncConfig::low_latency()));
    let stop = CancellationToken::new();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Ok(v) = queue.dequeue_cancellable(&stop) {
                    seen.push(v);
                }
                seen
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.enqueue(p * PER_PRODUCER + i);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    while !queue.is_empty() {
        thread::sleep(Duration::from_millis(5));
    }
    stop.cancel();

    let mut all = HashSet::new();
    for consumer in consumers {
        for v in consumer.join().unwrap() {
            assert!(all.insert(v), "{} dequeued twice", v);
        }
    }
    // Anything a consumer had not yet claimed is still queued
    while let Some(v) = queue.try_dequeue() {
        assert!(all.insert(v));
    }
    assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
}
