/*!
 * Safe Message Box
 *
 * Single-slot multicast: a published value may be consumed by at most a
 * fixed number of readers. Publishing replaces the holder wholesale (RCU
 * style), so a new message supersedes any unexhausted predecessor.
 */

use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Payload plus remaining-consumption counter
struct MsgHolder<T> {
    value: T,
    remaining: AtomicUsize,
}

/// Lock-free box holding one value with a bounded number of consumptions
///
/// # Performance
///
/// - **Publish**: one allocation and an atomic pointer swap
/// - **Consume**: atomic pointer load plus a CAS loop on the counter
pub struct SafeMessageBox<T> {
    holder: ArcSwapOption<MsgHolder<T>>,
}

impl<T> SafeMessageBox<T> {
    pub fn new() -> Self {
        Self {
            holder: ArcSwapOption::empty(),
        }
    }

    /// Replace the current message with `value`, consumable `max_consumers` times
    pub fn publish(&self, value: T, max_consumers: usize) {
        self.holder.store(Some(Arc::new(MsgHolder {
            value,
            remaining: AtomicUsize::new(max_consumers),
        })));
    }

    /// Consume the current message if it has lives left
    pub fn try_consume(&self) -> Option<T>
    where
        T: Clone,
    {
        let holder = self.holder.load_full()?;
        holder
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
            .map(|_| holder.value.clone())
    }

    /// Remaining consumptions of the current message
    pub fn remaining(&self) -> usize {
        match &*self.holder.load() {
            Some(holder) => holder.remaining.load(Ordering::Acquire),
            None => 0,
        }
    }
}

impl<T> Default for SafeMessageBox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SafeMessageBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeMessageBox")
            .field("remaining", &self.remaining())
            .finish()
    }
}
