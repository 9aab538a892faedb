/*!
 * Keyed Exchanger Tests
 */

use kernel_sync::{CancellationToken, KeyedExchanger, Timeout};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_rendezvous_symmetry() {
    let exchanger = Arc::new(KeyedExchanger::new());
    let barrier = Arc::new(Barrier::new(2));

    let spawn = |value: &'static str| {
        let exchanger = exchanger.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            exchanger.exchange_timeout(7u64, value, Duration::from_secs(5))
        })
    };
    let a = spawn("A");
    let b = spawn("B");

    assert_eq!(a.join().unwrap(), Some("B"));
    assert_eq!(b.join().unwrap(), Some("A"));

    // Slot removed: a late zero-timeout caller finds nobody
    assert_eq!(exchanger.exchange_now(7, "late"), None);
    assert_eq!(exchanger.waiting(), 0);
}

#[test]
fn test_many_keys_pair_independently() {
    const PAIRS: u32 = 16;
    let exchanger = Arc::new(KeyedExchanger::new());

    let handles: Vec<_> = (0..PAIRS * 2)
        .map(|i| {
            let exchanger = exchanger.clone();
            thread::spawn(move || (i, exchanger.exchange_timeout(i / 2, i, Duration::from_secs(5))))
        })
        .collect();

    for handle in handles {
        let (mine, partner) = handle.join().unwrap();
        assert_eq!(partner, Some(mine ^ 1));
    }
    assert_eq!(exchanger.waiting(), 0);
}

#[test]
fn test_cancel_after_swap_keeps_partner_value() {
    for _ in 0..20 {
        let exchanger = Arc::new(KeyedExchanger::new());
        let token = CancellationToken::new();
        let waiter = {
            let exchanger = exchanger.clone();
            let token = token.clone();
            thread::spawn(move || exchanger.exchange_cancellable("k", 10u32, Timeout::Forever, &token))
        };

        let start = Instant::now();
        while exchanger.waiting() == 0 {
            assert!(start.elapsed() < Duration::from_secs(5), "waiter never arrived");
            thread::yield_now();
        }

        // Swap first, then cancel: the value already handed over wins
        assert_eq!(exchanger.exchange_now("k", 20), Some(10));
        token.cancel();

        assert_eq!(waiter.join().unwrap(), Ok(Some(20)));
        assert_eq!(exchanger.waiting(), 0);
    }
}
