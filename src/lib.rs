/*!
 * Kernel Sync Library
 * In-process coordination primitives exposed as a library
 *
 * Blocking family (one mutex per instance, one completion per waiter):
 * - [`MonitorMailbox`], [`EventBus`], [`KeyedExchanger`], [`BoundedThreadPool`]
 *
 * Non-blocking family (CAS loops, epoch-based reclamation):
 * - [`LockFreeQueue`], [`LockFreeDualQueue`], [`LockFreeMailbox`], [`SafeMessageBox`]
 */

pub mod core;
pub mod ipc;
pub mod monitoring;
pub mod scheduler;

// Re-exports
pub use crate::core::errors::{SyncError, SyncResult};
pub use crate::core::sync::{
    CancellationToken, Deadline, LockFreeDualQueue, LockFreeMailbox, LockFreeQueue,
    LockFreeSendHandle, SafeMessageBox, SyncConfig, Timeout,
};
pub use ipc::{BusConfig, EventBus, KeyedExchanger, MonitorMailbox, SendHandle};
pub use monitoring::init_tracing;
pub use scheduler::{BoundedThreadPool, PoolConfig, PoolLifecycle};
