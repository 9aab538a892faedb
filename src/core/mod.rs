/*!
 * Core Module
 * Shared types, limits, error handling and synchronization building blocks
 */

pub mod data_structures;
pub mod errors;
pub mod limits;
pub mod sync;

// Re-export for convenience
pub use data_structures::{OrderedSlots, SlotHandle};
pub use errors::*;
pub use sync::{CancellationToken, Deadline, SyncConfig, Timeout};
