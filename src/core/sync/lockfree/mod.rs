/*!
 * Lock-Free Synchronization Primitives
 *
 * CAS-loop data structures that never take a lock:
 * - Michael–Scott FIFO queue
 * - Scherer–Scott dual queue (data or pending requests)
 * - Mailbox over two lock-free queues with busy-wait timeouts
 * - Single-slot multicast message box
 */

mod dual_queue;
mod mailbox;
mod message_box;
mod queue;

// Re-export public API
pub use dual_queue::LockFreeDualQueue;
pub use mailbox::{LockFreeMailbox, LockFreeSendHandle};
pub use message_box::SafeMessageBox;
pub use queue::LockFreeQueue;
