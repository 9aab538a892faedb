/*!
 * Monitor Mailbox
 *
 * Rendezvous queue with blocking receive and a cancellable send handle.
 *
 * # Design
 *
 * One mutex guards two ordered lists: undelivered envelopes and receivers
 * waiting for a message. Each waiting receiver owns a [`Completion`]; a
 * sender that finds one pops it and completes it under the lock, so the
 * receiver never has to win the lock again to learn it was served.
 */

use crate::core::data_structures::{OrderedSlots, SlotHandle};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::{CancellationToken, Completion, Timeout, WaitOutcome};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

struct Envelope<T> {
    value: T,
    delivered: Completion<()>,
}

struct MailboxState<T> {
    messages: OrderedSlots<Envelope<T>>,
    requests: OrderedSlots<Completion<T>>,
}

type SharedState<T> = Arc<Mutex<MailboxState<T>>>;

/// Blocking FIFO mailbox
///
/// # Example
///
/// ```
/// use kernel_sync::ipc::MonitorMailbox;
/// use kernel_sync::core::sync::Timeout;
///
/// let mailbox = MonitorMailbox::new();
/// let handle = mailbox.send("ping");
/// assert!(!handle.is_sent());
/// assert_eq!(mailbox.receive(Timeout::NoWait), Some("ping"));
/// assert!(handle.is_sent());
/// ```
pub struct MonitorMailbox<T> {
    state: SharedState<T>,
}

impl<T> MonitorMailbox<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MailboxState {
                messages: OrderedSlots::new(),
                requests: OrderedSlots::new(),
            })),
        }
    }

    /// Post a message; never blocks
    ///
    /// The oldest waiting receiver, if any, gets the value directly and the
    /// returned handle is already delivered.
    pub fn send(&self, value: T) -> SendHandle<T> {
        let mut state = self.state.lock();
        let mut value = value;

        while let Some(request) = state.requests.pop_head() {
            match request.complete(value) {
                Ok(()) => return SendHandle::delivered(),
                Err(returned) => value = returned,
            }
        }

        let delivered = Completion::new();
        let slot = state.messages.push_tail(Envelope {
            value,
            delivered: delivered.clone(),
        });
        SendHandle {
            mailbox: Some((Arc::clone(&self.state), slot)),
            delivered,
        }
    }

    /// Number of undelivered messages
    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().messages.is_empty()
    }
}

impl<T: Send + 'static> MonitorMailbox<T> {
    /// Receive the oldest message, waiting at most `timeout`
    pub fn receive(&self, timeout: impl Into<Timeout>) -> Option<T> {
        // Without a token the wait cannot be cancelled
        self.receive_inner(timeout.into(), None).unwrap_or(None)
    }

    /// Like [`receive`](Self::receive), abandoning the wait when `token` fires
    ///
    /// A receiver that was served before it noticed the cancellation still
    /// returns the delivered value.
    pub fn receive_cancellable(
        &self,
        timeout: impl Into<Timeout>,
        token: &CancellationToken,
    ) -> SyncResult<Option<T>> {
        self.receive_inner(timeout.into(), Some(token))
    }

    fn receive_inner(
        &self,
        timeout: Timeout,
        token: Option<&CancellationToken>,
    ) -> SyncResult<Option<T>> {
        let deadline = timeout.start();
        let (request, slot) = {
            let mut state = self.state.lock();
            if let Some(envelope) = state.messages.pop_head() {
                let _ = envelope.delivered.complete(());
                return Ok(Some(envelope.value));
            }
            if timeout.is_no_wait() {
                return Ok(None);
            }
            let request = Completion::new();
            let slot = state.requests.push_tail(request.clone());
            (request, slot)
        };

        let outcome = request.wait(&deadline, token);

        let mut state = self.state.lock();
        if let Some(value) = request.take() {
            return Ok(Some(value));
        }
        state.requests.remove(slot);
        match outcome {
            WaitOutcome::Cancelled => Err(SyncError::Cancelled),
            WaitOutcome::TimedOut | WaitOutcome::Completed => Ok(None),
        }
    }
}

impl<T> Default for MonitorMailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MonitorMailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MonitorMailbox")
            .field("pending_messages", &state.messages.len())
            .field("waiting_receivers", &state.requests.len())
            .finish()
    }
}

/// Tracks one sent message until a receiver takes it
pub struct SendHandle<T> {
    /// `None` when the message went straight to a waiting receiver
    mailbox: Option<(SharedState<T>, SlotHandle)>,
    delivered: Completion<()>,
}

impl<T> SendHandle<T> {
    fn delivered() -> Self {
        Self {
            mailbox: None,
            delivered: Completion::ready(()),
        }
    }

    /// Whether a receiver has taken the message
    #[inline]
    pub fn is_sent(&self) -> bool {
        self.delivered.is_complete()
    }

    /// Withdraw the message if it has not been delivered yet
    pub fn try_cancel(&self) -> bool {
        let Some((state, slot)) = &self.mailbox else {
            return false;
        };
        let mut state = state.lock();
        if self.delivered.is_complete() {
            return false;
        }
        state.messages.remove(*slot).is_some()
    }

    /// Whether the message is still queued (neither delivered nor cancelled)
    fn is_queued(&self) -> bool {
        match &self.mailbox {
            Some((state, slot)) => state.lock().messages.contains(*slot),
            None => false,
        }
    }

    /// Block until the message is delivered or `timeout` elapses
    ///
    /// Returns `false` immediately for a cancelled message.
    pub fn await_delivery(&self, timeout: impl Into<Timeout>) -> bool {
        if self.is_sent() {
            return true;
        }
        let timeout = timeout.into();
        if timeout.is_no_wait() || !self.is_queued() {
            return self.is_sent();
        }
        self.delivered.wait(&timeout.start(), None) == WaitOutcome::Completed
    }
}

impl<T> fmt::Debug for SendHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendHandle")
            .field("sent", &self.is_sent())
            .finish()
    }
}
