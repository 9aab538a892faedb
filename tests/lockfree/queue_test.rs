/*!
 * Michael–Scott Queue Tests
 */

use kernel_sync::LockFreeQueue;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

proptest! {
    #[test]
    fn prop_sequential_fifo(values in prop::collection::vec(any::<i64>(), 0..200)) {
        let queue = LockFreeQueue::new();
        for v in &values {
            queue.enqueue(*v);
        }
        let drained: Vec<_> = std::iter::from_fn(|| queue.dequeue()).collect();
        prop_assert_eq!(drained, values);
        prop_assert!(queue.is_empty());
    }

    #[test]
    fn prop_interleaved_ops_match_vecdeque(ops in prop::collection::vec(any::<Option<u16>>(), 0..300)) {
        let queue = LockFreeQueue::new();
        let mut model = std::collections::VecDeque::new();
        for op in ops {
            match op {
                Some(v) => {
                    queue.enqueue(v);
                    model.push_back(v);
                }
                None => prop_assert_eq!(queue.dequeue(), model.pop_front()),
            }
        }
        prop_assert_eq!(queue.is_empty(), model.is_empty());
    }
}

#[test]
fn test_concurrent_enqueue_dequeue_exactly_once() {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: usize = 5_000;

    let queue = Arc::new(LockFreeQueue::new());
    let done = Arc::new(AtomicBool::new(false));

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                loop {
                    match queue.dequeue() {
                        Some(v) => seen.push(v),
                        None if done.load(Ordering::Acquire) => break,
                        None => thread::yield_now(),
                    }
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
                    queue.enqueue((p, i));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::Release);

    let mut all = HashSet::new();
    for consumer in consumers {
        let seen = consumer.join().unwrap();
        // Per-producer order survives in each consumer's view
        for p in 0..PRODUCERS {
            let mine: Vec<_> = seen.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
            assert!(mine.windows(2).all(|w| w[0] < w[1]));
        }
        for v in seen {
            assert!(all.insert(v), "{:?} dequeued twice", v);
        }
    }
    assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
    assert!(queue.is_empty());
}
