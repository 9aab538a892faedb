/*!
 * Synchronization Configuration
 *
 * Runtime configuration for busy-waiting primitives
 */

use crate::core::limits::{MAX_BACKOFF_SLEEP, SPIN_PHASE_ITERATIONS, YIELD_PHASE_ITERATIONS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Busy-wait tuning shared by the lock-free mailbox and dual queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Iterations of `spin_loop` hints before yielding
    pub spin_iterations: u32,
    /// Iterations of `yield_now` before sleeping
    pub yield_iterations: u32,
    /// Cap for the exponentially growing sleep phase
    pub max_sleep: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            spin_iterations: SPIN_PHASE_ITERATIONS,
            yield_iterations: YIELD_PHASE_ITERATIONS,
            max_sleep: MAX_BACKOFF_SLEEP,
        }
    }
}

impl SyncConfig {
    /// Configuration optimized for low-latency (< 1ms wait expected)
    pub const fn low_latency() -> Self {
        Self {
            spin_iterations: 64,
            yield_iterations: 500,
            max_sleep: Duration::from_micros(50),
        }
    }

    /// Configuration optimized for long waits (> 1ms expected)
    pub const fn long_wait() -> Self {
        Self {
            spin_iterations: 4,
            yield_iterations: 16,
            max_sleep: Duration::from_millis(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_json_roundtrip() {
        let config = SyncConfig::low_latency();
        let json = serde_json::to_string(&config).unwrap();
        let back: SyncConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_presets_order_sleep_caps() {
        assert!(SyncConfig::low_latency().max_sleep < SyncConfig::default().max_sleep);
        assert!(SyncConfig::default().max_sleep < SyncConfig::long_wait().max_sleep);
    }
}
