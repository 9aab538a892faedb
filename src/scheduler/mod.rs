/*!
 * Scheduler Module
 * Worker thread pool with bounded size and idle retirement
 */

pub mod thread_pool;
pub mod types;

// Re-export public API
pub use thread_pool::BoundedThreadPool;
pub use types::{PoolConfig, PoolLifecycle};
