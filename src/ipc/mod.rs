/*!
 * IPC Module
 *
 * Monitor-style coordination between threads of one process:
 * - Mailbox: blocking FIFO with cancellable send handles
 * - Event bus: typed broadcast with bounded per-subscriber backlogs
 * - Exchanger: keyed pairwise rendezvous
 */

pub mod event_bus;
pub mod exchanger;
pub mod mailbox;

// Re-export public API
pub use event_bus::{BusConfig, EventBus};
pub use exchanger::KeyedExchanger;
pub use mailbox::{MonitorMailbox, SendHandle};
