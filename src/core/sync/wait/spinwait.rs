/*!
 * Adaptive Spin-Wait with Exponential Backoff
 *
 * Busy-waiting is the only suspension the lock-free primitives allow. To
 * keep it from pegging a core, every spinning thread walks three phases:
 *
 * 1. **Tight spin**: `spin_loop()` hint only
 * 2. **Yield**: `yield_now()` every iteration
 * 3. **Sleep**: exponentially growing sleep, capped by `SyncConfig::max_sleep`
 *
 * The cap bounds how late a cancellation is noticed. Sleeps never run past
 * the wait's deadline.
 */

use super::cancel::CancellationToken;
use super::completion::WaitOutcome;
use crate::core::sync::config::SyncConfig;
use crate::core::sync::timeout::Deadline;
use std::thread;
use std::time::Duration;

/// Backoff state for one busy-wait loop
#[derive(Debug, Clone)]
pub struct Backoff {
    config: SyncConfig,
    step: u32,
    sleep: Duration,
}

impl Backoff {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            step: 0,
            sleep: Duration::from_micros(1),
        }
    }

    /// Back off once, escalating with every call
    ///
    /// In the sleeping phase the sleep is clamped to what is left of
    /// `deadline`.
    pub fn snooze(&mut self, deadline: &Deadline) {
        if self.step < self.config.spin_iterations {
            std::hint::spin_loop();
        } else if self.step < self.config.spin_iterations + self.config.yield_iterations {
            thread::yield_now();
        } else {
            let slice = deadline.cap(self.sleep.min(self.config.max_sleep));
            if !slice.is_zero() {
                thread::sleep(slice);
            }
            self.sleep = (self.sleep * 2).min(self.config.max_sleep);
        }
        self.step = self.step.saturating_add(1);
    }

    /// Whether the sleeping phase has been reached
    pub fn is_sleeping(&self) -> bool {
        self.step >= self.config.spin_iterations + self.config.yield_iterations
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

/// Spin until `ready` returns true, the deadline passes, or `cancel` fires
///
/// `ready` is evaluated before every deadline/cancellation check, so a
/// condition that becomes true wins over a simultaneous timeout.
pub fn spin_until<F>(
    config: SyncConfig,
    deadline: &Deadline,
    cancel: Option<&CancellationToken>,
    mut ready: F,
) -> WaitOutcome
where
    F: FnMut() -> bool,
{
    let mut backoff = Backoff::new(config);
    loop {
        if ready() {
            return WaitOutcome::Completed;
        }
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return WaitOutcome::Cancelled;
        }
        if deadline.is_expired() {
            return WaitOutcome::TimedOut;
        }
        backoff.snooze(deadline);
    }
}
