/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for fallible primitive operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the coordination primitives
///
/// Timeouts are not errors: a wait that runs out of time reports `None` or
/// `false` through the normal return value.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Rejected: {0}")]
    #[diagnostic(
        code(sync::rejected),
        help("The primitive is shutting down and no longer accepts work.")
    )]
    Rejected(String),

    #[error("Wait was cancelled")]
    #[diagnostic(
        code(sync::cancelled),
        help("The cancellation token passed to this wait was triggered.")
    )]
    Cancelled,

    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(sync::invalid_argument),
        help("Check the configuration or call arguments.")
    )]
    InvalidArgument(String),

    #[error("Illegal state: {0}")]
    #[diagnostic(
        code(sync::illegal_state),
        help("Operation is not valid in the current lifecycle state.")
    )]
    IllegalState(String),

    #[error("Failed to spawn worker thread: {0}")]
    #[diagnostic(
        code(sync::spawn_failed),
        help("The OS refused to create a thread. Check process thread limits.")
    )]
    Spawn(String),
}

impl SyncError {
    /// Whether the error came from a cancelled wait
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    /// Whether the error came from a shut down primitive
    #[inline]
    pub fn is_rejected(&self) -> bool {
        matches!(self, SyncError::Rejected(_))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Spawn(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::Rejected("pool is shutting down".into());
        assert_eq!(err.to_string(), "Rejected: pool is shutting down");
        assert!(err.is_rejected());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_error_serialization() {
        let err = SyncError::InvalidArgument("max_workers must be positive".into());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("invalid_argument"));

        let back: SyncError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_io_error_maps_to_spawn() {
        let io = std::io::Error::new(std::io::ErrorKind::WouldBlock, "no threads left");
        let err: SyncError = io.into();
        assert!(matches!(err, SyncError::Spawn(_)));
    }
}
