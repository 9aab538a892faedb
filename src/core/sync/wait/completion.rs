/*!
 * Single-Resolution Completion
 *
 * One completion per blocked waiter. The waiter sleeps on the completion's
 * own condvar, never on the owning primitive's lock; the thread that
 * fulfils the wait does so while holding the primitive's lock, which makes
 * "was I fulfilled?" and "remove my record" a single atomic decision for
 * the waiter after a timeout or cancellation.
 *
 * # Lifecycle
 *
 * `Pending` → `Ready(value)` (exactly once) → `Taken`
 */

use super::cancel::CancellationToken;
use crate::core::sync::timeout::Deadline;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

/// Why a [`Completion::wait`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The completion holds (or held) a value
    Completed,
    /// The deadline passed first
    TimedOut,
    /// The cancellation token fired first
    Cancelled,
}

enum State<T> {
    Pending,
    Ready(T),
    Taken,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
}

impl<T> Inner<T> {
    fn notify(&self) {
        let _state = self.state.lock();
        self.cond.notify_all();
    }
}

/// Write-once result slot with blocking wait
pub struct Completion<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending),
                cond: Condvar::new(),
            }),
        }
    }

    /// Create an already-fulfilled completion
    pub fn ready(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Ready(value)),
                cond: Condvar::new(),
            }),
        }
    }

    /// Fulfil the completion, waking its waiter
    ///
    /// Hands the value back if the completion was already resolved.
    pub fn complete(&self, value: T) -> Result<(), T> {
        let mut state = self.inner.state.lock();
        match *state {
            State::Pending => {
                *state = State::Ready(value);
                self.inner.cond.notify_all();
                Ok(())
            }
            _ => Err(value),
        }
    }

    /// Whether the completion has been fulfilled (taken or not)
    #[inline]
    pub fn is_complete(&self) -> bool {
        !matches!(*self.inner.state.lock(), State::Pending)
    }

    /// Move the value out, once
    pub fn take(&self) -> Option<T> {
        let mut state = self.inner.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(value) => Some(value),
            State::Pending => {
                *state = State::Pending;
                None
            }
            State::Taken => None,
        }
    }
}

impl<T: Send + 'static> Completion<T> {
    /// Block until fulfilled, the deadline passes, or `cancel` fires
    ///
    /// Fulfilment wins ties: a completion resolved before the waiter
    /// observes its deadline or cancellation reports `Completed`.
    pub fn wait(&self, deadline: &Deadline, cancel: Option<&CancellationToken>) -> WaitOutcome {
        let _registration = cancel.map(|token| {
            let inner = Arc::clone(&self.inner);
            token.register(Arc::new(move || inner.notify()))
        });

        let mut state = self.inner.state.lock();
        loop {
            if !matches!(*state, State::Pending) {
                return WaitOutcome::Completed;
            }
            if cancel.is_some_and(|token| token.is_cancelled()) {
                return WaitOutcome::Cancelled;
            }
            match deadline.instant() {
                None => self.inner.cond.wait(&mut state),
                Some(at) => {
                    if deadline.is_expired() {
                        return WaitOutcome::TimedOut;
                    }
                    // Spurious and timed-out wakes both loop back to the checks
                    let _ = self.inner.cond.wait_until(&mut state, at);
                }
            }
        }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.inner.state.lock() {
            State::Pending => "pending",
            State::Ready(_) => "ready",
            State::Taken => "taken",
        };
        f.debug_struct("Completion").field("state", &state).finish()
    }
}
