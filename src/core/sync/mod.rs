/*!
 * Synchronization Primitives
 *
 * Shared machinery for every blocking or busy-waiting primitive in the
 * crate:
 * - Timeouts and deadlines (`NoWait`, bounded, forever)
 * - Cancellation tokens and per-waiter completions
 * - Adaptive backoff for the lock-free structures
 *
 * # Architecture
 *
 * Monitor-style primitives (mailbox, event bus, exchanger, thread pool)
 * keep one `Completion` per blocked waiter and resolve it under the
 * primitive's lock. Waiting happens on the completion alone, so a late
 * resolution is always observed by the waiter that owns it.
 *
 * Lock-free primitives never block: they spin with [`Backoff`] until a
 * deadline passes or a token is cancelled.
 */

mod config;
pub mod lockfree;
pub mod timeout;
pub mod wait;

pub use config::SyncConfig;
pub use lockfree::{
    LockFreeDualQueue, LockFreeMailbox, LockFreeQueue, LockFreeSendHandle, SafeMessageBox,
};
pub use timeout::{Deadline, Timeout};
pub use wait::{
    spin_until, Backoff, CancellationToken, Completion, WaitOutcome, Waker, WakerRegistration,
};
