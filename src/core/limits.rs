/*!
 * System Limits and Constants
 *
 * Centralized location for defaults, caps and tuning knobs shared by the
 * primitives. Grouped by subsystem.
 */

use std::time::Duration;

// =============================================================================
// EVENT BUS
// =============================================================================

/// Default per-subscriber backlog bound
/// Messages published while a backlog is full are dropped (newest first)
pub const DEFAULT_MAX_PENDING: usize = 64;

/// Upper bound accepted for a per-subscriber backlog
pub const MAX_PENDING_LIMIT: usize = 1 << 20;

// =============================================================================
// THREAD POOL
// =============================================================================

/// Default maximum number of worker threads
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Hard cap on worker threads per pool
pub const MAX_WORKERS_LIMIT: usize = 4096;

/// Default idle window before a worker retires
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(10);

/// Default worker thread name prefix
pub const DEFAULT_WORKER_PREFIX: &str = "pool-worker";

// =============================================================================
// BUSY WAITING
// =============================================================================

/// Iterations of pure `spin_loop` hints before yielding
/// [PERF] Covers handoffs that complete within a few hundred nanoseconds
pub const SPIN_PHASE_ITERATIONS: u32 = 16;

/// Iterations of `yield_now` before falling back to sleeping
pub const YIELD_PHASE_ITERATIONS: u32 = 100;

/// Longest single sleep taken by a busy-waiting thread
/// Bounds the latency between a cancellation/deadline and its observation
pub const MAX_BACKOFF_SLEEP: Duration = Duration::from_millis(1);
