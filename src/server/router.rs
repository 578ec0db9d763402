// ABOUTME: Schema-indexed dispatch: parse → type lookup → normalize inbound → validate → middleware → handler
// ABOUTME: Per-connection dispatch is serialized so onOpen/messages/onClose for one client never interleave

use super::connection::{ConnectionRegistry, ServerConnection};
use super::context::{Context, ErrorEvent, ErrorHook, ErrorKind};
use super::middleware::{BoxFuture, Middleware, Next, Terminal};
use crate::constants::{TYPE_ERROR, TYPE_RPC_ERROR};
use crate::envelope::{MessageSchema, RawEnvelope};
use crate::error::{Result, WirelinkError};
use crate::pubsub::adapter::{BrokerAdapter, PublishOutcome};
use crate::pubsub::plugin::{PubSubConfig, PubSubHandle, PubSubPlugin};
use crate::rpc::{RpcError, RpcErrorCode, ServerErrorPayload};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

pub type HandlerFn = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<()>> + Send + Sync>;

enum RouteKind {
    Event,
    Rpc { reply_type: String },
}

struct Route {
    schema: Arc<dyn MessageSchema>,
    kind: RouteKind,
    middleware: Vec<Middleware>,
    handler: HandlerFn,
}

/// Schema-indexed message router (§4.3).
pub struct Router {
    routes: HashMap<String, Route>,
    global_middleware: Vec<Middleware>,
    connections: Arc<ConnectionRegistry>,
    connection_data: RwLock<HashMap<String, Arc<RwLock<Value>>>>,
    dispatch_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
    pubsub: Option<Arc<PubSubPlugin>>,
    on_open_hook: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    on_close_hook: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    on_error_hook: Option<ErrorHook>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            global_middleware: Vec::new(),
            connections: Arc::new(ConnectionRegistry::new()),
            connection_data: RwLock::new(HashMap::new()),
            dispatch_locks: RwLock::new(HashMap::new()),
            pubsub: None,
            on_open_hook: None,
            on_close_hook: None,
            on_error_hook: None,
        }
    }

    pub fn connections(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.connections)
    }

    /// Register a fire-and-forget event route.
    pub fn on<F, Fut>(&mut self, schema: Arc<dyn MessageSchema>, handler: F) -> Result<&mut Self>
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.insert_route(schema, RouteKind::Event, Arc::new(move |ctx| Box::pin(handler(ctx))))?;
        Ok(self)
    }

    /// Register an RPC route: `request_schema`'s type is the one dispatched
    /// on; `reply_schema`'s type is what `ctx.reply()` sends back.
    pub fn rpc<F, Fut>(
        &mut self,
        request_schema: Arc<dyn MessageSchema>,
        reply_schema: Arc<dyn MessageSchema>,
        handler: F,
    ) -> Result<&mut Self>
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let reply_type = reply_schema.message_type().to_string();
        self.insert_route(
            request_schema,
            RouteKind::Rpc { reply_type },
            Arc::new(move |ctx| Box::pin(handler(ctx))),
        )?;
        Ok(self)
    }

    fn insert_route(&mut self, schema: Arc<dyn MessageSchema>, kind: RouteKind, handler: HandlerFn) -> Result<()> {
        let message_type = schema.message_type().to_string();
        if self.routes.contains_key(&message_type) {
            return Err(WirelinkError::duplicate_registration(format!(
                "a route is already registered for type '{}'",
                message_type
            )));
        }
        self.routes.insert(
            message_type,
            Route {
                schema,
                kind,
                middleware: Vec::new(),
                handler,
            },
        );
        Ok(())
    }

    pub fn use_global(&mut self, middleware: Middleware) -> &mut Self {
        self.global_middleware.push(middleware);
        self
    }

    pub fn use_for(&mut self, message_type: &str, middleware: Middleware) -> Result<&mut Self> {
        let route = self
            .routes
            .get_mut(message_type)
            .ok_or_else(|| WirelinkError::internal(format!("no route registered for '{}'", message_type)))?;
        route.middleware.push(middleware);
        Ok(self)
    }

    pub fn on_open(&mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> &mut Self {
        self.on_open_hook = Some(Arc::new(hook));
        self
    }

    pub fn on_close(&mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> &mut Self {
        self.on_close_hook = Some(Arc::new(hook));
        self
    }

    pub fn on_error(&mut self, hook: impl Fn(ErrorEvent) + Send + Sync + 'static) -> &mut Self {
        self.on_error_hook = Some(Arc::new(hook));
        self
    }

    /// Merge another router's routes and global middleware into this one.
    /// Duplicate route types are a construction-time error.
    pub fn merge(&mut self, other: Router) -> Result<&mut Self> {
        for (message_type, route) in other.routes {
            if self.routes.contains_key(&message_type) {
                return Err(WirelinkError::duplicate_registration(format!(
                    "merge conflict: '{}' is registered in both routers",
                    message_type
                )));
            }
            self.routes.insert(message_type, route);
        }
        self.global_middleware.extend(other.global_middleware);
        Ok(self)
    }

    /// Install a pub/sub plugin backed by `adapter`. Every connection gets its
    /// own topic set from `onOpen` onward.
    pub fn with_pubsub(&mut self, adapter: Arc<dyn BrokerAdapter>, config: PubSubConfig) -> &mut Self {
        self.pubsub = Some(PubSubPlugin::new(adapter, Arc::clone(&self.connections), config));
        self
    }

    pub fn pubsub_plugin(&self) -> Option<Arc<PubSubPlugin>> {
        self.pubsub.clone()
    }

    /// Server-initiated publish with no originating connection (§4.3). There
    /// is no sender to exclude, so `excludeSelf` never applies here — it is
    /// the per-connection `PubSubHandle::publish`'s concern, not this one's.
    pub async fn publish(
        &self,
        topic: &str,
        schema: &Arc<dyn MessageSchema>,
        payload: Option<Value>,
    ) -> Result<PublishOutcome> {
        let plugin = self
            .pubsub
            .as_ref()
            .ok_or_else(|| WirelinkError::internal("publish() requires a pub/sub plugin installed via with_pubsub"))?;
        plugin.publish_with_schema(topic, schema, payload, None, false).await
    }

    fn error_hook(self: &Arc<Self>) -> ErrorHook {
        let router = Arc::clone(self);
        Arc::new(move |event: ErrorEvent| {
            if let Some(hook) = &router.on_error_hook {
                hook(event);
            }
        })
    }

    async fn dispatch_lock(&self, client_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.dispatch_locks.read().await.get(client_id) {
            return Arc::clone(lock);
        }
        let mut guard = self.dispatch_locks.write().await;
        Arc::clone(
            guard
                .entry(client_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    pub async fn handle_open(self: &Arc<Self>, connection: Arc<dyn ServerConnection>) {
        let client_id = connection.client_id().to_string();
        self.connections.register(Arc::clone(&connection)).await;
        self.connection_data
            .write()
            .await
            .insert(client_id.clone(), Arc::new(RwLock::new(Value::Null)));

        if let Some(plugin) = &self.pubsub {
            plugin.on_open(&client_id).await;
        }
        if let Some(hook) = &self.on_open_hook {
            hook(&client_id);
        }
        debug!(client_id = %client_id, "connection opened");
    }

    pub async fn handle_close(self: &Arc<Self>, client_id: &str) {
        let lock = self.dispatch_lock(client_id).await;
        let _guard = lock.lock().await;

        self.connections.unregister(client_id).await;
        self.connection_data.write().await.remove(client_id);
        self.dispatch_locks.write().await.remove(client_id);

        if let Some(plugin) = &self.pubsub {
            plugin.on_close(client_id).await;
        }
        if let Some(hook) = &self.on_close_hook {
            hook(client_id);
        }
        debug!(client_id = %client_id, "connection closed");
    }

    /// Parse, validate, and dispatch one inbound text frame (§4.3).
    pub async fn handle_message(self: &Arc<Self>, client_id: &str, raw_text: &str) {
        let lock = self.dispatch_lock(client_id).await;
        let _guard = lock.lock().await;

        let raw: RawEnvelope = match serde_json::from_str(raw_text) {
            Ok(raw) => raw,
            Err(e) => {
                self.emit_error(ErrorKind::Parse, client_id, None, e.to_string());
                return;
            }
        };

        let RawEnvelope {
            message_type,
            mut meta,
            payload,
        } = raw;

        let route = match self.routes.get(&message_type) {
            Some(route) => route,
            None => {
                self.emit_error(
                    ErrorKind::UnknownType,
                    client_id,
                    Some(message_type.clone()),
                    format!("no route registered for type '{}'", message_type),
                );
                self.send_unstructured_error(client_id, None, format!("unknown message type '{}'", message_type))
                    .await;
                return;
            }
        };

        // Strip any client-forged reserved keys before validation so a schema
        // never has to account for them; clientId/receivedAt are injected
        // only after the schema accepts the rest of the message (§4.1).
        meta.strip_reserved();

        let meta_json = serde_json::to_value(&meta).unwrap_or(Value::Null);
        let meta_outcome = route.schema.validate_meta(&meta_json);
        if !meta_outcome.is_ok() {
            self.fail_validation(client_id, &message_type, &route.kind, &meta, meta_outcome.issues())
                .await;
            return;
        }
        let payload_outcome = route.schema.validate_payload(payload.as_ref());
        if !payload_outcome.is_ok() {
            self.fail_validation(client_id, &message_type, &route.kind, &meta, payload_outcome.issues())
                .await;
            return;
        }

        meta.set_client_id(client_id);
        meta.set_received_at(crate::time::now_ms());

        let connection = match self.connections.get(client_id).await {
            Some(connection) => connection,
            None => return,
        };
        let data = self
            .connection_data
            .read()
            .await
            .get(client_id)
            .cloned()
            .unwrap_or_else(|| Arc::new(RwLock::new(Value::Null)));

        let reply_type = match &route.kind {
            RouteKind::Rpc { reply_type } => Some(reply_type.clone()),
            RouteKind::Event => None,
        };

        let pubsub_handle = match &self.pubsub {
            Some(plugin) => plugin
                .topics_for(client_id)
                .await
                .map(|topics| PubSubHandle::new(Arc::clone(plugin), topics, client_id.to_string())),
            None => None,
        };

        let correlation_id = meta.correlation_id().unwrap_or_default().to_string();
        let is_rpc = matches!(route.kind, RouteKind::Rpc { .. });

        let ctx = Context::new(
            connection,
            client_id,
            message_type.clone(),
            meta,
            payload,
            data,
            reply_type,
            self.error_hook(),
            pubsub_handle,
        );

        let mut chain = self.global_middleware.clone();
        chain.extend(route.middleware.iter().cloned());
        let handler = Arc::clone(&route.handler);
        let terminal: Terminal = Arc::new(move |ctx| handler(ctx));
        let next = Next::new(Arc::new(chain), terminal);

        if let Err(e) = next.run(ctx).await {
            self.emit_error(ErrorKind::Handler, client_id, Some(message_type.clone()), e.to_string());
            if is_rpc {
                let error = RpcError::internal(e.to_string());
                self.send_envelope(client_id, error.into_envelope(&correlation_id)).await;
            } else {
                self.send_unstructured_error(client_id, None, e.to_string()).await;
            }
        }
    }

    async fn fail_validation(
        &self,
        client_id: &str,
        message_type: &str,
        kind: &RouteKind,
        meta: &crate::envelope::Meta,
        issues: &[String],
    ) {
        let detail = issues.join("; ");
        self.emit_error(ErrorKind::Validation, client_id, Some(message_type.to_string()), detail.clone());
        match kind {
            RouteKind::Rpc { .. } => {
                let correlation_id = meta.correlation_id().unwrap_or_default();
                let error = RpcError::new(RpcErrorCode::InvalidArgument, detail);
                self.send_envelope(client_id, error.into_envelope(correlation_id)).await;
            }
            RouteKind::Event => {
                self.send_unstructured_error(client_id, meta.correlation_id(), detail).await;
            }
        }
    }

    async fn send_envelope<T: serde::Serialize>(&self, client_id: &str, envelope: crate::envelope::Envelope<T>) {
        if let Some(connection) = self.connections.get(client_id).await {
            if let Ok(text) = serde_json::to_string(&envelope) {
                let _ = connection.send_text(text).await;
            }
        }
    }

    async fn send_unstructured_error(&self, client_id: &str, correlation_id: Option<&str>, message: String) {
        let payload = ServerErrorPayload {
            message,
            code: None,
            details: None,
        };
        let envelope = payload.into_envelope(correlation_id);
        self.send_envelope(client_id, envelope).await;
    }

    fn emit_error(&self, kind: ErrorKind, client_id: &str, message_type: Option<String>, detail: String) {
        warn!(client_id = %client_id, ?kind, "{}", detail);
        if let Some(hook) = &self.on_error_hook {
            hook(ErrorEvent {
                kind,
                client_id: client_id.to_string(),
                message_type,
                detail,
            });
        }
    }
}
