/*!
 * Cancellation Tokens
 *
 * Cooperative cancellation for blocked waits. A waiter registers a waker
 * with the token before suspending and re-checks `is_cancelled()` under its
 * own lock; `cancel()` flips the flag first and then runs every registered
 * waker, so a cancellation can never slip between the check and the wait.
 *
 * Wakers run on the cancelling thread, outside the token's internal lock.
 */

use ahash::HashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback invoked when a token is cancelled
pub type Waker = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct WakerTable {
    next_id: u64,
    entries: HashMap<u64, Waker>,
}

struct TokenInner {
    cancelled: AtomicBool,
    wakers: Mutex<WakerTable>,
}

/// Shared cancellation flag with wake-up of registered waiters
///
/// Cloning yields another handle to the same token.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                wakers: Mutex::new(WakerTable::default()),
            }),
        }
    }

    /// Cancel the token and wake every registered waiter
    ///
    /// Returns `false` if the token was already cancelled.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }

        let wakers: Vec<Waker> = self.inner.wakers.lock().entries.values().cloned().collect();
        tracing::trace!(waiters = wakers.len(), "cancellation token triggered");
        for waker in wakers {
            waker();
        }
        true
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register a waker for the lifetime of the returned registration
    ///
    /// The waker is not invoked if the token is already cancelled; callers
    /// must check [`is_cancelled`](Self::is_cancelled) after registering.
    pub fn register(&self, waker: Waker) -> WakerRegistration {
        let mut table = self.inner.wakers.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.entries.insert(id, waker);

        WakerRegistration {
            token: Arc::clone(&self.inner),
            id,
        }
    }

    /// Number of currently registered waiters (diagnostics)
    pub fn waiter_count(&self) -> usize {
        self.inner.wakers.lock().entries.len()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Removes its waker from the token when dropped
#[must_use = "dropping the registration immediately unregisters the waker"]
pub struct WakerRegistration {
    token: Arc<TokenInner>,
    id: u64,
}

impl Drop for WakerRegistration {
    fn drop(&mut self) {
        self.token.wakers.lock().entries.remove(&self.id);
    }
}
