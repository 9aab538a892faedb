/*!
 * Wait/Notify Primitives
 *
 * Building blocks shared by every blocking or busy-waiting operation:
 * - Cancellation tokens with waker registration
 * - Single-resolution completions (one per blocked waiter)
 * - Adaptive spin-wait for the lock-free primitives
 */

mod cancel;
mod completion;
mod spinwait;

// Re-export public API
pub use cancel::{CancellationToken, Waker, WakerRegistration};
pub use completion::{Completion, WaitOutcome};
pub use spinwait::{spin_until, Backoff};
