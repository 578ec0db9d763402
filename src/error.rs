// ABOUTME: Error types and handling for the wirelink framework
// ABOUTME: Provides a general-purpose error enum plus the structured RPC error type

//! Error types and utilities for the wirelink framework.
//!
//! [`WirelinkError`] covers local/programming-surface failures (config, envelope
//! construction, broker-adapter failures, topic-set rollback). Errors that cross
//! the wire to a client awaiting an RPC reply use [`crate::rpc::RpcError`] instead,
//! since they carry a `code`/`retryable`/`retryAfterMs` triple the generic enum
//! has no use for.

use thiserror::Error;

/// Result type alias for wirelink operations.
pub type Result<T> = std::result::Result<T, WirelinkError>;

/// General-purpose error type for wirelink operations that do not cross the wire.
#[derive(Debug, Error, Clone)]
pub enum WirelinkError {
    /// Envelope construction or structural validation failure.
    #[error("envelope error: {0}")]
    Envelope(String),

    /// Schema validation failure (root/meta/payload strictness, reserved keys, etc).
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration construction failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Transport-level failure (connect, send, unexpected close).
    #[error("transport error: {0}")]
    Transport(String),

    /// Broker adapter failure (publish/subscribe/unsubscribe/replace).
    #[error("broker adapter error: {0}")]
    Adapter(String),

    /// Topic-set batch mutation failed and was rolled back.
    ///
    /// `rollback_failed` and `failed_rollback_topics` enrich the telemetry without
    /// discarding the original failure; the batch's net effect is still "rolled back".
    #[error("topic set operation failed: {message}")]
    TopicSetRollback {
        message: String,
        rollback_failed: bool,
        failed_rollback_topics: Vec<String>,
    },

    /// Capacity exceeded (topics, pending requests, queue).
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Operation was cancelled via a `CancelToken`.
    #[error("operation cancelled")]
    Cancelled,

    /// Duplicate registration (schema, route) where only one is permitted.
    #[error("duplicate registration: {0}")]
    DuplicateRegistration(String),

    /// Internal invariant violation; should not normally surface to callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WirelinkError {
    pub fn envelope(msg: impl Into<String>) -> Self {
        Self::Envelope(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn adapter(msg: impl Into<String>) -> Self {
        Self::Adapter(msg.into())
    }

    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    pub fn duplicate_registration(msg: impl Into<String>) -> Self {
        Self::DuplicateRegistration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True if this is a rollback error (used by tests to inspect rollback telemetry).
    pub fn is_rollback_failed(&self) -> bool {
        matches!(
            self,
            Self::TopicSetRollback {
                rollback_failed: true,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for WirelinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for WirelinkError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::Transport(format!("operation timed out: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let err = WirelinkError::envelope("missing payload");
        assert!(matches!(err, WirelinkError::Envelope(_)));
    }

    #[test]
    fn test_rollback_error_reports_telemetry() {
        let err = WirelinkError::TopicSetRollback {
            message: "adapter failed on topic b".to_string(),
            rollback_failed: true,
            failed_rollback_topics: vec!["a".to_string()],
        };
        assert!(err.is_rollback_failed());
        assert!(err.to_string().contains("adapter failed on topic b"));
    }

    #[test]
    fn test_result_type_compatibility() {
        fn fails() -> Result<()> {
            Err(WirelinkError::resource_exhausted("pending request limit reached"))
        }
        assert!(fails().is_err());
    }
}
