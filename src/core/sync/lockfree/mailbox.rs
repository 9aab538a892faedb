/*!
 * Lock-Free Mailbox
 *
 * Send/receive over two lock-free queues: one of undelivered messages and
 * one of receivers waiting for a message. Nothing ever blocks on a lock;
 * waiting receivers and senders awaiting delivery busy-wait with backoff.
 *
 * # Late Delivery
 *
 * A waiting receiver owns a one-shot parcel slot. A sender delivers by
 * CAS-ing null → parcel; a receiver that gives up CAS-es null → `CLOSED`
 * tag. Exactly one of the two wins, so a message is never handed to a
 * receiver that already returned empty.
 *
 * Closed requests stay in the request queue until a later `send` walks
 * past them. Receivers that only ever time out, with no sends, grow that
 * queue without bound.
 */

use super::queue::LockFreeQueue;
use crate::core::sync::config::SyncConfig;
use crate::core::sync::timeout::Timeout;
use crate::core::sync::wait::{spin_until, WaitOutcome};
use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Tag marking a request slot its receiver has abandoned
const CLOSED: usize = 1;

/// Guarantees spare low pointer bits for the `CLOSED` tag
#[repr(align(8))]
struct Parcel<T>(T);

/// A receiver waiting for a direct handoff
struct PendingRequest<T> {
    slot: Atomic<Parcel<T>>,
}

impl<T> PendingRequest<T> {
    fn new() -> Self {
        Self {
            slot: Atomic::null(),
        }
    }

    /// Hand `value` over; returns it back if the receiver already left
    fn deliver(&self, value: T) -> Result<(), T> {
        let guard = &epoch::pin();
        match self.slot.compare_exchange(
            Shared::null(),
            Owned::new(Parcel(value)),
            Ordering::AcqRel,
            Ordering::Acquire,
            guard,
        ) {
            Ok(_) => Ok(()),
            Err(err) => Err(err.new.into_box().0),
        }
    }

    fn is_filled(&self) -> bool {
        let guard = &epoch::pin();
        !self.slot.load(Ordering::Acquire, guard).is_null()
    }

    /// Close the slot, taking the parcel if one arrived
    fn close(&self) -> Option<T> {
        let guard = &epoch::pin();
        let previous = self.slot.swap(
            Shared::null().with_tag(CLOSED),
            Ordering::AcqRel,
            guard,
        );
        if previous.is_null() {
            None
        } else {
            // Safety: only the receiver swaps the slot, and it does so once;
            // the sender is done with the parcel after its CAS
            Some(unsafe { previous.into_owned() }.into_box().0)
        }
    }
}

impl<T> Drop for PendingRequest<T> {
    fn drop(&mut self) {
        // Safety: exclusive access in drop
        unsafe {
            let guard = epoch::unprotected();
            let parcel = self.slot.load(Ordering::Relaxed, guard);
            if !parcel.is_null() {
                drop(parcel.into_owned());
            }
        }
    }
}

// Safety: the slot transfers one `T` between threads
unsafe impl<T: Send> Send for PendingRequest<T> {}
unsafe impl<T: Send> Sync for PendingRequest<T> {}

struct Envelope<T> {
    value: T,
    sent: Arc<AtomicBool>,
}

/// Delivery status returned by [`LockFreeMailbox::send`]
#[derive(Debug, Clone)]
pub struct LockFreeSendHandle {
    sent: Arc<AtomicBool>,
    config: SyncConfig,
}

impl LockFreeSendHandle {
    /// Whether a receiver has taken the message
    #[inline]
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }

    /// Spin until delivered or `timeout` elapses
    pub fn await_delivery(&self, timeout: impl Into<Timeout>) -> bool {
        let timeout = timeout.into();
        if self.is_sent() || timeout.is_no_wait() {
            return self.is_sent();
        }
        spin_until(self.config, &timeout.start(), None, || self.is_sent()) == WaitOutcome::Completed
    }
}

/// Mailbox built from two lock-free queues with busy-wait timeouts
pub struct LockFreeMailbox<T> {
    messages: LockFreeQueue<Envelope<T>>,
    requests: LockFreeQueue<Arc<PendingRequest<T>>>,
    config: SyncConfig,
}

impl<T: Send> LockFreeMailbox<T> {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            messages: LockFreeQueue::new(),
            requests: LockFreeQueue::new(),
            config,
        }
    }

    /// Send a message, handing it directly to a waiting receiver if any
    pub fn send(&self, value: T) -> LockFreeSendHandle {
        let sent = Arc::new(AtomicBool::new(false));
        let mut value = value;

        while let Some(request) = self.requests.dequeue() {
            match request.deliver(value) {
                Ok(()) => {
                    sent.store(true, Ordering::Release);
                    return self.handle(sent);
                }
                // That receiver timed out; try the next one
                Err(returned) => value = returned,
            }
        }

        self.messages.enqueue(Envelope {
            value,
            sent: Arc::clone(&sent),
        });
        self.handle(sent)
    }

    fn handle(&self, sent: Arc<AtomicBool>) -> LockFreeSendHandle {
        LockFreeSendHandle {
            sent,
            config: self.config,
        }
    }

    /// Take the oldest message without waiting
    fn take_message(&self) -> Option<T> {
        self.messages.dequeue().map(|envelope| {
            envelope.sent.store(true, Ordering::Release);
            envelope.value
        })
    }

    /// Receive a message, spinning for at most `timeout`
    pub fn receive(&self, timeout: impl Into<Timeout>) -> Option<T> {
        if let Some(value) = self.take_message() {
            return Some(value);
        }

        let timeout = timeout.into();
        if timeout.is_no_wait() {
            return None;
        }

        let deadline = timeout.start();
        loop {
            let request = Arc::new(PendingRequest::new());
            self.requests.enqueue(Arc::clone(&request));

            let _ = spin_until(self.config, &deadline, None, || {
                request.is_filled() || !self.messages.is_empty()
            });

            // Closing decides the race with a late sender
            if let Some(value) = request.close() {
                return Some(value);
            }
            // A message may have been queued by a sender that saw no requests
            if let Some(value) = self.take_message() {
                return Some(value);
            }
            if deadline.is_expired() {
                return None;
            }
        }
    }

    /// Weakly consistent: no undelivered messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<T: Send> Default for LockFreeMailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LockFreeMailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeMailbox")
            .field("messages_empty", &self.messages.is_empty())
            .field("requests_empty", &self.requests.is_empty())
            .finish()
    }
}
