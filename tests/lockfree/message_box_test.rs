/*!
 * Safe Message Box Tests
 */

use kernel_sync::SafeMessageBox;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_exhaustion_k_of_k_plus_one() {
    for k in [1usize, 3, 8] {
        let mbox = Arc::new(SafeMessageBox::new());
        mbox.publish(k, k);
        let barrier = Arc::new(Barrier::new(k + 1));

        let consumers: Vec<_> = (0..=k)
            .map(|_| {
                let mbox = mbox.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    mbox.try_consume()
                })
            })
            .collect();

        let results: Vec<_> = consumers.into_iter().map(|c| c.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| **r == Some(k)).count(), k);
        assert_eq!(results.iter().filter(|r| r.is_none()).count(), 1);
    }
}

#[test]
fn test_republish_restores_lives() {
    let mbox = SafeMessageBox::new();
    mbox.publish("first", 1);
    assert_eq!(mbox.try_consume(), Some("first"));
    assert_eq!(mbox.try_consume(), None);

    mbox.publish("second", 2);
    assert_eq!(mbox.try_consume(), Some("second"));
    assert_eq!(mbox.remaining(), 1);
}
