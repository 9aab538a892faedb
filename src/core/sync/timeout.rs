/*!
 * Timeouts and Deadlines
 *
 * Relative timeouts are converted once into an absolute, monotonic deadline
 * when a wait begins. Every wake re-checks the deadline instead of re-using
 * the original relative value, so spurious wakeups never extend a wait.
 *
 * ## Timeout Classes
 *
 * - **NoWait**: never suspend, answer from current state only
 * - **After(d)**: suspend for at most `d`
 * - **Forever**: suspend until the condition holds (or cancellation)
 *
 * ## Example
 *
 * ```
 * use kernel_sync::core::sync::Timeout;
 * use std::time::Duration;
 *
 * let deadline = Timeout::from(Duration::from_millis(10)).start();
 * while !deadline.is_expired() {
 *     // ... wait for at most deadline.remaining()
 *     # break;
 * }
 * assert!(Timeout::from(Duration::ZERO).is_no_wait());
 * ```
 */

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Relative timeout for a blocking operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeout {
    /// Do not wait at all
    NoWait,
    /// Wait for at most this long
    After(Duration),
    /// Wait without a time bound
    Forever,
}

impl Timeout {
    /// True iff this timeout forbids suspension. Distinct from `Forever`.
    #[inline]
    pub const fn is_no_wait(&self) -> bool {
        matches!(self, Self::NoWait)
    }

    /// Convert into an absolute deadline measured from now
    #[inline]
    pub fn start(self) -> Deadline {
        let at = match self {
            Self::NoWait => Some(Instant::now()),
            // Durations too large for the clock behave as "forever"
            Self::After(d) => Instant::now().checked_add(d),
            Self::Forever => None,
        };
        Deadline { at }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::Forever
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Self::NoWait
        } else {
            Self::After(d)
        }
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(d: Option<Duration>) -> Self {
        match d {
            Some(d) => d.into(),
            None => Self::Forever,
        }
    }
}

/// Absolute point in time after which a wait is abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// `None` means the wait never expires
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never passes
    #[inline]
    pub const fn forever() -> Self {
        Self { at: None }
    }

    /// Absolute instant, `None` for a deadline that never passes
    #[inline]
    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Remaining time, `Some(ZERO)` once expired, `None` if unbounded
    #[inline]
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Check whether the deadline has passed
    #[inline]
    pub fn is_expired(&self) -> bool {
        match self.at {
            None => false,
            Some(at) => Instant::now() >= at,
        }
    }

    /// Remaining time clamped to `max`, for sliced sleeps
    #[inline]
    pub fn cap(&self, max: Duration) -> Duration {
        match self.remaining() {
            None => max,
            Some(rem) => rem.min(max),
        }
    }
}
