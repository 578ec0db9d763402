// ABOUTME: Inbound multi-handler dispatch (§4.9): schema-validated type lookup, then multi-handler fan-out
// ABOUTME: onUnhandled fires for a structurally-valid but unregistered type; onError reports parse/validation/handler failures

use crate::envelope::{MessageSchema, RawEnvelope};
use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type HandlerFn = Arc<dyn Fn(RawEnvelope) -> BoxFuture<'static, Result<()>> + Send + Sync>;
pub type UnhandledHook = Arc<dyn Fn(RawEnvelope) + Send + Sync>;

/// Mirrors the server's `ErrorKind` (§4.3) for the client's inbound path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// The inbound frame was not valid JSON, or not a valid envelope shape.
    Parse,
    /// A schema is registered for the type but the payload failed it.
    Validation,
    /// A registered handler itself returned an error.
    Handler,
    /// A frame was dropped from the outbound queue before it could be sent.
    Queue,
}

#[derive(Debug, Clone)]
pub struct ClientErrorEvent {
    pub kind: ClientErrorKind,
    pub message_type: Option<String>,
    pub detail: String,
}

pub type ErrorHook = Arc<dyn Fn(ClientErrorEvent) + Send + Sync>;

/// Registry of inbound-message handlers, keyed by `type`. More than one
/// handler may be registered for the same type; all of them run. A schema
/// may optionally be registered per type as well, in which case the payload
/// is validated before any handler sees it.
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<HandlerFn>>>,
    schemas: RwLock<HashMap<String, Arc<dyn MessageSchema>>>,
    on_unhandled: RwLock<Option<UnhandledHook>>,
    on_error: RwLock<Option<ErrorHook>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            schemas: RwLock::new(HashMap::new()),
            on_unhandled: RwLock::new(None),
            on_error: RwLock::new(None),
        }
    }

    pub async fn on(&self, message_type: impl Into<String>, handler: HandlerFn) {
        self.handlers
            .write()
            .await
            .entry(message_type.into())
            .or_default()
            .push(handler);
    }

    /// Register a schema a type's payload must validate against before any
    /// handler for that type runs.
    pub async fn register_schema(&self, schema: Arc<dyn MessageSchema>) {
        self.schemas
            .write()
            .await
            .insert(schema.message_type().to_string(), schema);
    }

    pub async fn on_unhandled(&self, hook: UnhandledHook) {
        *self.on_unhandled.write().await = Some(hook);
    }

    pub async fn on_error(&self, hook: ErrorHook) {
        *self.on_error.write().await = Some(hook);
    }

    /// Report an error through the registered hook, if any. Exposed so
    /// callers outside of `dispatch` (inbound parse failures, outbound queue
    /// overflow) can report through the same channel.
    pub async fn report_error(&self, kind: ClientErrorKind, message_type: Option<String>, detail: String) {
        if let Some(hook) = self.on_error.read().await.as_ref() {
            hook(ClientErrorEvent { kind, message_type, detail });
        }
    }

    /// Validate (if a schema is registered for the type), then snapshot the
    /// handlers for `message_type` before dispatching, so a handler
    /// registering/unregistering mid-dispatch cannot affect this round.
    ///
    /// - A registered-but-invalid payload reports `ClientErrorKind::Validation`
    ///   and never reaches a handler or `onUnhandled`.
    /// - An unregistered but structurally-valid type reaches `onUnhandled`.
    pub async fn dispatch(&self, envelope: RawEnvelope) {
        let schema = self.schemas.read().await.get(&envelope.message_type).cloned();
        if let Some(schema) = schema {
            let outcome = schema.validate_payload(envelope.payload.as_ref());
            if !outcome.is_ok() {
                self.report_error(
                    ClientErrorKind::Validation,
                    Some(envelope.message_type.clone()),
                    outcome.issues().join("; "),
                )
                .await;
                return;
            }
        }

        let handlers = {
            let guard = self.handlers.read().await;
            guard.get(&envelope.message_type).cloned()
        };

        let handlers = match handlers {
            Some(h) if !h.is_empty() => h,
            _ => {
                if let Some(hook) = self.on_unhandled.read().await.as_ref() {
                    hook(envelope);
                }
                return;
            }
        };

        for handler in handlers {
            if let Err(e) = handler(envelope.clone()).await {
                self.report_error(ClientErrorKind::Handler, Some(envelope.message_type.clone()), e.to_string())
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Meta;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_multiple_handlers_for_same_type_all_run() {
        let registry = HandlerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let c = Arc::clone(&count);
            registry
                .on(
                    "EVENT",
                    Arc::new(move |_env| {
                        let c = Arc::clone(&c);
                        Box::pin(async move {
                            c.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }) as BoxFuture<'static, Result<()>>
                    }),
                )
                .await;
        }

        registry
            .dispatch(RawEnvelope::new("EVENT", Meta::new(), None))
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unhandled_type_triggers_hook() {
        let registry = HandlerRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        registry
            .on_unhandled(Arc::new(move |_env| {
                s.fetch_add(1, Ordering::SeqCst);
            }))
            .await;
        registry
            .dispatch(RawEnvelope::new("NOBODY_HOME", Meta::new(), None))
            .await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_handler_failing_does_not_block_others() {
        let registry = HandlerRegistry::new();
        let ran = Arc::new(AtomicUsize::new(0));

        registry
            .on(
                "EVENT",
                Arc::new(|_env| Box::pin(async { Err(crate::error::WirelinkError::internal("boom")) }) as BoxFuture<'static, Result<()>>),
            )
            .await;
        let r = Arc::clone(&ran);
        registry
            .on(
                "EVENT",
                Arc::new(move |_env| {
                    let r = Arc::clone(&r);
                    Box::pin(async move {
                        r.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }) as BoxFuture<'static, Result<()>>
                }),
            )
            .await;

        registry
            .dispatch(RawEnvelope::new("EVENT", Meta::new(), None))
            .await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[cfg(feature = "validation")]
    #[tokio::test]
    async fn test_invalid_payload_against_registered_schema_reports_validation_and_skips_handler() {
        use crate::envelope::validator::JsonMessageSchema;
        use serde_json::json;

        let registry = HandlerRegistry::new();
        let schema = JsonMessageSchema::new(
            "JOIN",
            json!({"type": "object", "properties": {}}),
            Some(json!({"type": "object", "properties": {"room": {"type": "string"}}, "required": ["room"]})),
        )
        .unwrap();
        registry.register_schema(schema).await;

        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        registry
            .on(
                "JOIN",
                Arc::new(move |_env| {
                    let r = Arc::clone(&r);
                    Box::pin(async move {
                        r.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }) as BoxFuture<'static, Result<()>>
                }),
            )
            .await;

        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let e = Arc::clone(&events);
        registry
            .on_error(Arc::new(move |event| {
                e.lock().unwrap().push(event);
            }))
            .await;

        registry
            .dispatch(RawEnvelope::new("JOIN", Meta::new(), Some(json!({}))))
            .await;

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        let guard = events.lock().unwrap();
        assert_eq!(guard.len(), 1);
        assert_eq!(guard[0].kind, ClientErrorKind::Validation);
    }

    #[cfg(feature = "validation")]
    #[tokio::test]
    async fn test_valid_payload_against_registered_schema_reaches_handler() {
        use crate::envelope::validator::JsonMessageSchema;
        use serde_json::json;

        let registry = HandlerRegistry::new();
        let schema = JsonMessageSchema::new(
            "JOIN",
            json!({"type": "object", "properties": {}}),
            Some(json!({"type": "object", "properties": {"room": {"type": "string"}}, "required": ["room"]})),
        )
        .unwrap();
        registry.register_schema(schema).await;

        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        registry
            .on(
                "JOIN",
                Arc::new(move |_env| {
                    let r = Arc::clone(&r);
                    Box::pin(async move {
                        r.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }) as BoxFuture<'static, Result<()>>
                }),
            )
            .await;

        registry
            .dispatch(RawEnvelope::new("JOIN", Meta::new(), Some(json!({"room": "lobby"}))))
            .await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
