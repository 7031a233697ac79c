//! Error types for the replaykit engine
//!
//! Collaborator failures are converted into failure results at the call
//! site; the variants here cover validation, state machine and plumbing
//! errors that propagate to the embedding application.

use thiserror::Error;

/// Main error type for the playback engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Playback state machine transition errors
    #[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Sequence rejected by pre-flight validation
    #[error("Sequence validation failed: {0}")]
    ValidationFailed(String),

    /// Platform collaborator errors (input injection, window queries)
    #[error("Platform error: {0}")]
    PlatformError(String),

    /// Element-detection collaborator errors
    #[error("Element detection error: {0}")]
    DetectionError(String),

    /// Context could not be detected
    #[error("Context detection failed: {0}")]
    ContextError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic errors with context
    #[error("Engine error: {0}")]
    Generic(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Convert anyhow errors to EngineError
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::Timeout { duration_ms: 2500 };
        assert!(err.to_string().contains("2500"));
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = EngineError::InvalidTransition {
            from: "Idle".to_string(),
            to: "Completed".to_string(),
            reason: "terminal states only reachable from Running/Paused".to_string(),
        };
        assert!(err.to_string().contains("Idle"));
        assert!(err.to_string().contains("Completed"));
    }

    #[test]
    fn test_platform_error_wrapping() {
        let err = EngineError::PlatformError("mouse injection rejected".to_string());
        assert!(err.to_string().contains("mouse injection"));
    }
}
