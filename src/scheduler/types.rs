/*!
 * Thread Pool Types
 * Configuration and lifecycle types for the bounded worker pool
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{
    DEFAULT_KEEP_ALIVE, DEFAULT_MAX_WORKERS, DEFAULT_WORKER_PREFIX, MAX_WORKERS_LIMIT,
};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

/// Pool lifecycle
///
/// Transitions only forward: `Accepting` → `ShuttingDown` → `Terminated`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolLifecycle {
    /// New work is accepted
    Accepting,
    /// `execute` is rejected; workers drain the backlog and retire
    ShuttingDown,
    /// Every worker has retired
    Terminated,
}

impl PoolLifecycle {
    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accepting => "accepting",
            Self::ShuttingDown => "shutting_down",
            Self::Terminated => "terminated",
        }
    }
}

impl Serialize for PoolLifecycle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Upper bound on live worker threads
    pub max_workers: usize,
    /// How long an idle worker waits for work before retiring
    pub keep_alive: Duration,
    /// Worker threads are named `{prefix}-{n}`
    pub thread_name_prefix: String,
}

impl PoolConfig {
    pub fn new(max_workers: usize, keep_alive: Duration) -> Self {
        Self {
            max_workers,
            keep_alive,
            ..Self::default()
        }
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Reject configurations that could never run a task
    pub fn validate(&self) -> SyncResult<()> {
        if self.max_workers == 0 || self.max_workers > MAX_WORKERS_LIMIT {
            return Err(SyncError::InvalidArgument(format!(
                "max_workers must be in 1..={}, got {}",
                MAX_WORKERS_LIMIT, self.max_workers
            )));
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(SyncError::InvalidArgument(
                "thread_name_prefix must not contain NUL bytes".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            keep_alive: DEFAULT_KEEP_ALIVE,
            thread_name_prefix: DEFAULT_WORKER_PREFIX.to_string(),
        }
    }
}
