/*!
 * Keyed Exchanger
 *
 * Pairs two threads presenting the same key and swaps their values. The
 * first arriver parks a slot; the second removes it, completes the first
 * arriver's reply and returns immediately.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::{CancellationToken, Completion, Timeout, WaitOutcome};
use ahash::HashMap;
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;

struct Slot<T> {
    offered: T,
    reply: Completion<T>,
}

/// Rendezvous point keyed by `K`
pub struct KeyedExchanger<K, T> {
    slots: Mutex<HashMap<K, Slot<T>>>,
}

impl<K, T> KeyedExchanger<K, T>
where
    K: Eq + Hash + Clone,
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::default()),
        }
    }

    /// Exchange with a partner, waiting as long as it takes
    pub fn exchange(&self, key: K, value: T) -> Option<T> {
        self.exchange_inner(key, value, Timeout::Forever, None)
            .unwrap_or(None)
    }

    /// Exchange only with a partner that is already waiting
    pub fn exchange_now(&self, key: K, value: T) -> Option<T> {
        self.exchange_timeout(key, value, Timeout::NoWait)
    }

    /// Exchange with a partner arriving within `timeout`
    pub fn exchange_timeout(&self, key: K, value: T, timeout: impl Into<Timeout>) -> Option<T> {
        self.exchange_inner(key, value, timeout.into(), None)
            .unwrap_or(None)
    }

    /// Exchange within `timeout`, giving up with `Cancelled` when `token` fires
    ///
    /// A partner that arrived before the cancellation was observed still
    /// completes the exchange.
    pub fn exchange_cancellable(
        &self,
        key: K,
        value: T,
        timeout: impl Into<Timeout>,
        token: &CancellationToken,
    ) -> SyncResult<Option<T>> {
        self.exchange_inner(key, value, timeout.into(), Some(token))
    }

    fn exchange_inner(
        &self,
        key: K,
        value: T,
        timeout: Timeout,
        token: Option<&CancellationToken>,
    ) -> SyncResult<Option<T>> {
        let deadline = timeout.start();
        let reply = {
            let mut slots = self.slots.lock();
            if let Some(waiting) = slots.remove(&key) {
                // Second arriver: swap and return without waiting
                return match waiting.reply.complete(value) {
                    Ok(()) => Ok(Some(waiting.offered)),
                    Err(_) => Ok(None),
                };
            }
            if timeout.is_no_wait() {
                return Ok(None);
            }
            let reply = Completion::new();
            slots.insert(
                key.clone(),
                Slot {
                    offered: value,
                    reply: reply.clone(),
                },
            );
            reply
        };

        let outcome = reply.wait(&deadline, token);

        let mut slots = self.slots.lock();
        if let Some(partner) = reply.take() {
            return Ok(Some(partner));
        }
        // Not completed, so the slot under `key` is still ours
        slots.remove(&key);
        match outcome {
            WaitOutcome::Cancelled => Err(SyncError::Cancelled),
            WaitOutcome::TimedOut | WaitOutcome::Completed => Ok(None),
        }
    }

    /// Number of keys with a first arriver waiting
    pub fn waiting(&self) -> usize {
        self.slots.lock().len()
    }
}

impl<K, T> Default for KeyedExchanger<K, T>
where
    K: Eq + Hash + Clone,
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> fmt::Debug for KeyedExchanger<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedExchanger")
            .field("waiting", &self.slots.lock().len())
            .finish()
    }
}
