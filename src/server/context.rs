// ABOUTME: Per-dispatch handler context: connection identity, meta/payload, app data, reply/progress
// ABOUTME: The pub/sub and RPC surfaces are optional fields, present only when the route needs them

//! One [`Context`] is built per inbound message and handed through the
//! middleware chain to the handler. `data` is an arbitrary JSON value the
//! handler can read and mutate via [`Context::assign_data`]; it survives for
//! the lifetime of the connection, not just the one dispatch.

use super::connection::ServerConnection;
use crate::envelope::{Envelope, Meta, MessageSchema};
use crate::error::Result;
use crate::pubsub::adapter::PublishOutcome;
use crate::pubsub::plugin::PubSubHandle;
use crate::rpc::{ProgressPayload, RpcError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    UnknownType,
    Validation,
    Middleware,
    Handler,
}

#[derive(Clone)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub client_id: String,
    pub message_type: Option<String>,
    pub detail: String,
}

pub type ErrorHook = Arc<dyn Fn(ErrorEvent) + Send + Sync>;

pub struct Context {
    connection: Arc<dyn ServerConnection>,
    client_id: String,
    pub message_type: String,
    pub meta: Meta,
    pub payload: Option<Value>,
    data: Arc<RwLock<Value>>,
    reply_type: Option<String>,
    error_hook: ErrorHook,
    pubsub: Option<PubSubHandle>,
}

impl Context {
    pub fn new(
        connection: Arc<dyn ServerConnection>,
        client_id: impl Into<String>,
        message_type: impl Into<String>,
        meta: Meta,
        payload: Option<Value>,
        data: Arc<RwLock<Value>>,
        reply_type: Option<String>,
        error_hook: ErrorHook,
        pubsub: Option<PubSubHandle>,
    ) -> Self {
        Self {
            connection,
            client_id: client_id.into(),
            message_type: message_type.into(),
            meta,
            payload,
            data,
            reply_type,
            error_hook,
            pubsub,
        }
    }

    #[cfg(test)]
    pub fn new_for_test(
        connection: Arc<dyn ServerConnection>,
        client_id: impl Into<String>,
        message_type: impl Into<String>,
        meta: Meta,
        payload: Option<Value>,
    ) -> Self {
        Self::new(
            connection,
            client_id,
            message_type,
            meta,
            payload,
            Arc::new(RwLock::new(Value::Null)),
            None,
            Arc::new(|_| {}),
            None,
        )
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub async fn data(&self) -> Value {
        self.data.read().await.clone()
    }

    pub async fn assign_data(&self, value: Value) {
        *self.data.write().await = value;
    }

    pub fn pubsub(&self) -> Option<&PubSubHandle> {
        self.pubsub.as_ref()
    }

    /// Schema-validated publish through the installed pub/sub plugin
    /// (§2, §4.3). Fails if no plugin was installed via `Router::with_pubsub`.
    pub async fn publish(
        &self,
        topic: &str,
        schema: &Arc<dyn MessageSchema>,
        payload: Option<Value>,
        exclude_self: bool,
    ) -> Result<PublishOutcome> {
        let pubsub = self
            .pubsub
            .as_ref()
            .ok_or_else(|| crate::error::WirelinkError::internal("publish() requires a pub/sub plugin"))?;
        pubsub.publish_with_schema(topic, schema, payload, exclude_self).await
    }

    /// Send an arbitrary envelope to this connection's own peer.
    pub async fn send<T: Serialize>(&self, message_type: &str, meta: Meta, payload: Option<T>) -> Result<()> {
        let envelope = Envelope::new(message_type, meta, payload);
        let text = serde_json::to_string(&envelope)?;
        self.connection.send_text(text).await
    }

    /// Reply to an RPC request. The correlation id is copied from the
    /// inbound request's meta; `extra_meta` is merged in on top.
    pub async fn reply<T: Serialize>(&self, payload: T, extra_meta: Option<Meta>) -> Result<()> {
        let reply_type = self
            .reply_type
            .as_deref()
            .ok_or_else(|| crate::error::WirelinkError::internal("reply() called on a non-rpc route"))?;

        let mut meta = extra_meta.unwrap_or_default();
        if let Some(correlation_id) = self.meta.correlation_id() {
            meta.set_correlation_id(correlation_id);
        }
        self.send(reply_type, meta, Some(payload)).await
    }

    /// Emit a non-terminal progress frame correlated to the inbound request.
    pub async fn progress(&self, data: Value) -> Result<()> {
        let correlation_id = self
            .meta
            .correlation_id()
            .ok_or_else(|| crate::error::WirelinkError::internal("progress() requires a correlationId"))?;
        let envelope = ProgressPayload { data }.into_envelope(correlation_id);
        let text = serde_json::to_string(&envelope)?;
        self.connection.send_text(text).await
    }

    /// Reply with a structured `RPC_ERROR` instead of a successful reply.
    pub async fn reply_error(&self, error: RpcError) -> Result<()> {
        let correlation_id = self.meta.correlation_id().unwrap_or_default().to_string();
        let envelope = error.into_envelope(&correlation_id);
        let text = serde_json::to_string(&envelope)?;
        self.connection.send_text(text).await
    }

    /// Report a non-fatal error to the router's `onError` hook without
    /// terminating the dispatch (e.g. a handler catching its own recoverable
    /// failure but still wanting it observed).
    pub fn report_error(&self, detail: impl Into<String>) {
        tracing::event!(Level::WARN, client_id = %self.client_id, "{}", detail.into());
        (self.error_hook)(ErrorEvent {
            kind: ErrorKind::Handler,
            client_id: self.client_id.clone(),
            message_type: Some(self.message_type.clone()),
            detail: String::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::connection::InMemoryConnection;

    #[tokio::test]
    async fn test_reply_requires_reply_type_configured() {
        let conn = InMemoryConnection::new("c1");
        let ctx = Context::new_for_test(conn, "c1", "GET_TIME", Meta::new(), None);
        let result = ctx.reply(serde_json::json!({"now": 1}), None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_assign_data_and_read_back() {
        let conn = InMemoryConnection::new("c1");
        let ctx = Context::new_for_test(conn, "c1", "PING", Meta::new(), None);
        ctx.assign_data(serde_json::json!({"count": 1})).await;
        assert_eq!(ctx.data().await, serde_json::json!({"count": 1}));
    }
}
