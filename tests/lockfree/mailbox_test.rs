/*!
 * Lock-Free Mailbox Tests
 */

use kernel_sync::{LockFreeMailbox, SyncConfig, Timeout};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_fifo_per_sender() {
    let mailbox = LockFreeMailbox::new();
    for i in 0..50 {
        mailbox.send(i);
    }
    for expected in 0..50 {
        assert_eq!(mailbox.receive(Timeout::NoWait), Some(expected));
    }
    assert!(mailbox.is_empty());
}

#[test]
fn test_timed_out_receivers_do_not_lose_messages() {
    let mailbox = Arc::new(LockFreeMailbox::with_config(SyncConfig::low_latency()));

    let receivers: Vec<_> = (0..4)
        .map(|_| {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                let mut got = Vec::new();
                while let Some(v) = mailbox.receive(Duration::from_millis(100)) {
                    got.push(v);
                }
                got
            })
        })
        .collect();

    for i in 0..500 {
        mailbox.send(i);
    }

    let mut all = HashSet::new();
    for receiver in receivers {
        for v in receiver.join().unwrap() {
            assert!(all.insert(v));
        }
    }
    while let Some(v) = mailbox.receive(Timeout::NoWait) {
        assert!(all.insert(v));
    }
    assert_eq!(all.len(), 500);
}
