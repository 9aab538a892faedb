/*!
 * Monitor Mailbox Tests
 */

use kernel_sync::{CancellationToken, MonitorMailbox, SyncError, Timeout};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_sequential_sends_received_in_order() {
    let mailbox = MonitorMailbox::new();
    let handles: Vec<_> = (0..100).map(|i| mailbox.send(i)).collect();

    for expected in 0..100 {
        assert_eq!(mailbox.receive(Duration::from_secs(1)), Some(expected));
    }
    assert!(handles.iter().all(|h| h.is_sent()));
}

#[test]
fn test_waiting_receivers_served_oldest_first() {
    let mailbox = Arc::new(MonitorMailbox::new());

    let first = {
        let mailbox = mailbox.clone();
        thread::spawn(move || mailbox.receive(Timeout::Forever))
    };
    thread::sleep(Duration::from_millis(50));
    let second = {
        let mailbox = mailbox.clone();
        thread::spawn(move || mailbox.receive(Timeout::Forever))
    };
    thread::sleep(Duration::from_millis(50));

    assert!(mailbox.send(1).is_sent());
    assert!(mailbox.send(2).is_sent());
    assert_eq!(first.join().unwrap(), Some(1));
    assert_eq!(second.join().unwrap(), Some(2));
}

#[test]
fn test_await_delivery_completes_when_received() {
    let mailbox = Arc::new(MonitorMailbox::new());
    let handle = mailbox.send("payload");

    let receiver = {
        let mailbox = mailbox.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            mailbox.receive(Timeout::NoWait)
        })
    };

    assert!(handle.await_delivery(Duration::from_secs(5)));
    assert_eq!(receiver.join().unwrap(), Some("payload"));
}

#[test]
fn test_cancel_delivers_if_fulfilled_under_contention() {
    for round in 0..50 {
        let mailbox = Arc::new(MonitorMailbox::new());
        let token = CancellationToken::new();
        let receiver = {
            let mailbox = mailbox.clone();
            let token = token.clone();
            thread::spawn(move || mailbox.receive_cancellable(Timeout::Forever, &token))
        };

        thread::sleep(Duration::from_millis(1));
        let handle = mailbox.send(round);
        token.cancel();

        match receiver.join().unwrap() {
            Ok(Some(value)) => {
                assert_eq!(value, round);
                assert!(handle.is_sent());
            }
            // Cancelled before the send reached it: the message stays queued
            Err(SyncError::Cancelled) => {
                assert!(!handle.is_sent());
                assert_eq!(mailbox.receive(Timeout::NoWait), Some(round));
            }
            other => panic!("unexpected receive result: {:?}", other),
        }
    }
}
