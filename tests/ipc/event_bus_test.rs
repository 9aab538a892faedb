/*!
 * Event Bus Tests
 */

use kernel_sync::{BusConfig, EventBus};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
struct Tick(u32);

#[derive(Debug, Clone, PartialEq)]
struct Alert(&'static str);

fn wait_for_subscribers<M: 'static>(bus: &EventBus, n: usize) {
    let start = Instant::now();
    while bus.subscriber_count::<M>() < n {
        assert!(start.elapsed() < Duration::from_secs(5), "subscribers never registered");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_backpressure_drops_newest() {
    const BOUND: usize = 4;
    const EXTRA: usize = 3;

    let bus = Arc::new(EventBus::with_config(BusConfig::new(BOUND)).unwrap());
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let subscriber = {
        let bus = bus.clone();
        thread::spawn(move || {
            let mut seen = Vec::new();
            bus.subscribe(|tick: &Tick| {
                if seen.is_empty() {
                    // Stall on the first message so the backlog fills up
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                }
                seen.push(tick.0);
            })
            .unwrap();
            seen
        })
    };
    wait_for_subscribers::<Tick>(&bus, 1);

    assert_eq!(bus.publish(Tick(0)), Ok(1));
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let accepted: usize = (1..=(BOUND + EXTRA) as u32)
        .map(|i| bus.publish(Tick(i)).unwrap())
        .sum();
    assert_eq!(accepted, BOUND);

    release_tx.send(()).unwrap();
    bus.shutdown().unwrap();

    let seen = subscriber.join().unwrap();
    assert_eq!(seen, (0..=BOUND as u32).collect::<Vec<_>>());
}

#[test]
fn test_broadcast_to_every_subscriber_of_type() {
    let bus = Arc::new(EventBus::new());
    let subscribers: Vec<_> = (0..3)
        .map(|_| {
            let bus = bus.clone();
            thread::spawn(move || {
                let mut alerts = Vec::new();
                bus.subscribe(|alert: &Alert| alerts.push(alert.0)).unwrap();
                alerts
            })
        })
        .collect();
    wait_for_subscribers::<Alert>(&bus, 3);

    assert_eq!(bus.publish(Alert("disk")), Ok(3));
    assert_eq!(bus.publish(Alert("cpu")), Ok(3));
    assert_eq!(bus.publish(Tick(1)), Ok(0));
    bus.shutdown().unwrap();

    for subscriber in subscribers {
        assert_eq!(subscriber.join().unwrap(), vec!["disk", "cpu"]);
    }
}

#[test]
fn test_shutdown_waits_for_running_handlers() {
    let bus = Arc::new(EventBus::new());
    let handled = Arc::new(AtomicBool::new(false));
    let subscriber = {
        let bus = bus.clone();
        let handled = handled.clone();
        thread::spawn(move || {
            bus.subscribe(|_: &Tick| {
                thread::sleep(Duration::from_millis(100));
                handled.store(true, Ordering::SeqCst);
            })
        })
    };
    wait_for_subscribers::<Tick>(&bus, 1);
    bus.publish(Tick(1)).unwrap();

    bus.shutdown().unwrap();
    assert!(handled.load(Ordering::SeqCst));
    assert_eq!(bus.subscriber_count::<Tick>(), 0);
    assert_eq!(subscriber.join().unwrap(), Ok(()));
    assert!(bus.publish(Tick(2)).unwrap_err().is_rejected());
}
