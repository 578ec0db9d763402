// ABOUTME: Structured RPC error taxonomy (§4.3) and the special wire types (ERROR, RPC_ERROR, progress)
// ABOUTME: Shared between the server router (producer) and the client request tracker (consumer)

//! RPC-domain errors cross the wire, so they carry `code`/`retryable`/
//! `retryAfterMs` rather than being folded into [`crate::error::WirelinkError`].

use crate::constants::{TYPE_ERROR, TYPE_RPC_ERROR, TYPE_RPC_PROGRESS};
use crate::envelope::{Envelope, Meta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// gRPC-aligned RPC error codes (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcErrorCode {
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    FailedPrecondition,
    NotFound,
    AlreadyExists,
    Aborted,
    DeadlineExceeded,
    ResourceExhausted,
    Unavailable,
    Unimplemented,
    Internal,
    Cancelled,
}

/// Structured RPC error payload, carried by `RPC_ERROR` envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: RpcErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "retryAfterMs")]
    pub retry_after_ms: Option<u64>,
    #[serde(skip)]
    pub correlation_id: Option<String>,
}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            retryable: None,
            retry_after_ms: None,
            correlation_id: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Internal, message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_retry(mut self, retryable: bool, retry_after_ms: Option<u64>) -> Self {
        self.retryable = Some(retryable);
        self.retry_after_ms = retry_after_ms;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Build the `RPC_ERROR` envelope that carries this error, correlated to
    /// the request it answers.
    pub fn into_envelope(self, correlation_id: &str) -> Envelope<RpcError> {
        let mut meta = Meta::new();
        meta.set_correlation_id(correlation_id);
        Envelope::event(TYPE_RPC_ERROR, meta, self)
    }
}

/// Legacy unstructured error payload, carried by `ERROR` envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerErrorPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ServerErrorPayload {
    pub fn into_envelope(self, correlation_id: Option<&str>) -> Envelope<ServerErrorPayload> {
        let mut meta = Meta::new();
        if let Some(correlation_id) = correlation_id {
            meta.set_correlation_id(correlation_id);
        }
        Envelope::event(TYPE_ERROR, meta, self)
    }
}

/// Non-terminal progress payload, carried by `$ws:rpc-progress` envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub data: Value,
}

impl ProgressPayload {
    pub fn into_envelope(self, correlation_id: &str) -> Envelope<ProgressPayload> {
        let mut meta = Meta::new();
        meta.set_correlation_id(correlation_id);
        Envelope::event(TYPE_RPC_PROGRESS, meta, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rpc_error_envelope_carries_correlation_id() {
        let error = RpcError::new(RpcErrorCode::NotFound, "no such room");
        let envelope = error.into_envelope("r1");
        assert_eq!(envelope.message_type, TYPE_RPC_ERROR);
        assert_eq!(envelope.meta.correlation_id(), Some("r1"));
    }

    #[test]
    fn test_rpc_error_serializes_code_as_screaming_snake_case() {
        let error = RpcError::new(RpcErrorCode::ResourceExhausted, "too many topics");
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["code"], json!("RESOURCE_EXHAUSTED"));
    }

    #[test]
    fn test_progress_envelope_uses_special_type() {
        let progress = ProgressPayload { data: json!({"step": 1}) };
        let envelope = progress.into_envelope("r2");
        assert_eq!(envelope.message_type, TYPE_RPC_PROGRESS);
    }
}
