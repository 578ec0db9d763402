// ABOUTME: Client state machine: connect/reconnect with backoff, queuing while offline, request/reply, multi-handler dispatch
// ABOUTME: Composes state.rs + queue.rs + request.rs + handlers.rs + auth.rs around one ClientTransport

use super::auth::{attach, AuthMode, TokenProvider};
use super::handlers::{ClientErrorKind, ErrorHook, HandlerFn, HandlerRegistry, UnhandledHook};
use super::queue::{EnqueueOutcome, OutboundQueue, QueuePolicy};
use super::request::{ClientRequestError, RequestTracker};
use super::state::{BackoffConfig, ConnectionState, StateMachine};
use super::transport::{ClientTransport, CloseEvent, TransportEvent};
use crate::cancel::CancelToken;
use crate::constants::{DEFAULT_MAX_PENDING_REQUESTS, DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::envelope::{normalize_outbound, Meta, MessageSchema, RawEnvelope};
use crate::error::{Result, WirelinkError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

pub struct ClientConfig {
    pub url: String,
    pub auth_mode: AuthMode,
    pub token_provider: Option<Arc<dyn TokenProvider>>,
    pub subprotocols: Vec<String>,
    pub backoff: BackoffConfig,
    pub queue_policy: QueuePolicy,
    pub queue_capacity: usize,
    pub max_pending_requests: usize,
    pub request_timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_mode: AuthMode::default(),
            token_provider: None,
            subprotocols: Vec::new(),
            backoff: BackoffConfig::default(),
            queue_policy: QueuePolicy::DropOldest,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// The client-side state machine (§4.6-§4.9): one instance per logical
/// connection to a router, independent of what `ClientTransport` it rides on.
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn ClientTransport>,
    state: Arc<StateMachine>,
    queue: Mutex<OutboundQueue>,
    requests: Arc<RequestTracker>,
    handlers: Arc<HandlerRegistry>,
    sent_signals: Mutex<HashMap<String, oneshot::Sender<()>>>,
    cancel: CancelToken,
}

impl Client {
    /// Fails at construction time if `config.auth_mode` is a `Subprotocol`
    /// whose prefix contains whitespace or a comma (RFC 6455), rather than
    /// letting a malformed handshake fail deep inside a connect attempt.
    pub fn new(config: ClientConfig, transport: Arc<dyn ClientTransport>) -> Result<Arc<Self>> {
        if let AuthMode::Subprotocol { prefix } = &config.auth_mode {
            super::auth::validate_subprotocol_prefix(prefix)?;
        }
        let queue = OutboundQueue::new(config.queue_policy, config.queue_capacity);
        let requests = RequestTracker::new(config.max_pending_requests);
        Ok(Arc::new(Self {
            config,
            transport,
            state: StateMachine::new(),
            queue: Mutex::new(queue),
            requests,
            handlers: Arc::new(HandlerRegistry::new()),
            sent_signals: Mutex::new(HashMap::new()),
            cancel: CancelToken::new(),
        }))
    }

    pub fn state(&self) -> ConnectionState {
        self.state.current()
    }

    pub async fn on(&self, message_type: impl Into<String>, handler: HandlerFn) {
        self.handlers.on(message_type, handler).await;
    }

    /// Register a schema a type's payload must validate against before any
    /// handler registered for it runs (§4.9).
    pub async fn register_schema(&self, schema: Arc<dyn MessageSchema>) {
        self.handlers.register_schema(schema).await;
    }

    pub async fn on_unhandled(&self, hook: UnhandledHook) {
        self.handlers.on_unhandled(hook).await;
    }

    pub async fn on_error(&self, hook: ErrorHook) {
        self.handlers.on_error(hook).await;
    }

    /// Idempotent: a second call while already connecting/open/reconnecting
    /// is a no-op.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        self.state.mark_manual_close(false);
        if !self.state.try_begin_connect().await {
            return Ok(());
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.connect_loop().await;
        });
        Ok(())
    }

    pub async fn close(self: &Arc<Self>) {
        self.state.mark_manual_close(true);
        self.state.set(ConnectionState::Closing);
        self.cancel.cancel();
        let _ = self.transport.close(crate::constants::CLOSE_CODE_NORMAL, "client closed").await;
        self.state.set(ConnectionState::Closed);
        self.requests.fail_all(ClientRequestError::ConnectionClosed).await;
    }

    pub async fn once_open(&self) {
        self.state.once_open().await;
    }

    async fn connect_loop(self: Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            match self.attempt_connect().await {
                Ok(()) => {
                    self.state.set(ConnectionState::Open);
                    self.state.reset_attempts();
                    self.drain_queue().await;
                    self.read_loop().await;
                    if self.state.is_manual_close() {
                        return;
                    }
                    self.requests.fail_all(ClientRequestError::ConnectionClosed).await;
                }
                Err(e) => {
                    warn!(error = %e, "connect attempt failed");
                }
            }

            if self.state.is_manual_close() {
                return;
            }
            let attempt = self.state.next_attempt();
            if self.config.backoff.exhausted(attempt) {
                self.state.set(ConnectionState::Closed);
                return;
            }
            self.state.set(ConnectionState::Reconnecting);
            let delay = self.config.backoff.delay_ms(attempt);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                _ = self.cancel.cancelled() => return,
            }
        }
    }

    async fn attempt_connect(&self) -> Result<()> {
        let token = match &self.config.token_provider {
            Some(provider) => provider.token().await,
            None => None,
        };
        let (url, subprotocols) = attach(&self.config.auth_mode, token.as_deref(), &self.config.url, &self.config.subprotocols)?;
        self.transport.connect(&url, &subprotocols).await
    }

    async fn read_loop(&self) {
        loop {
            match self.transport.next_event().await {
                Some(TransportEvent::Message(text)) => self.handle_inbound(text).await,
                Some(TransportEvent::Closed(event)) => {
                    debug!(?event, "transport closed");
                    return;
                }
                None => return,
            }
        }
    }

    async fn handle_inbound(&self, text: String) {
        let envelope: RawEnvelope = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "failed to parse inbound frame");
                self.handlers
                    .report_error(ClientErrorKind::Parse, None, e.to_string())
                    .await;
                return;
            }
        };
        if self.requests.dispatch(&envelope).await {
            return;
        }
        self.handlers.dispatch(envelope).await;
    }

    async fn drain_queue(&self) {
        let frames = self.queue.lock().await.drain();
        for frame in frames {
            self.transmit_now(&frame).await;
        }
    }

    async fn transmit_now(&self, frame: &str) {
        if self.transport.send_text(frame.to_string()).await.is_ok() {
            if let Some(correlation_id) = peek_correlation_id(frame) {
                if let Some(sender) = self.sent_signals.lock().await.remove(&correlation_id) {
                    let _ = sender.send(());
                }
            }
        }
    }

    /// Fire-and-forget send. Normalizes outbound meta (strips reserved keys,
    /// ignores a caller-supplied correlationId, injects a timestamp), then
    /// sends immediately if `Open` or enqueues otherwise.
    pub async fn send(&self, message_type: impl Into<String>, mut meta: Meta, payload: Option<Value>) -> Result<()> {
        normalize_outbound(&mut meta, None);
        let envelope = RawEnvelope::new(message_type.into(), meta, payload);
        let text = serde_json::to_string(&envelope)?;
        self.enqueue_or_send(text).await
    }

    async fn enqueue_or_send(&self, text: String) -> Result<()> {
        if self.state.current() == ConnectionState::Open {
            self.transport.send_text(text).await
        } else {
            match self.queue.lock().await.enqueue(text) {
                EnqueueOutcome::Rejected => Err(WirelinkError::transport("not connected and queueing is disabled")),
                EnqueueOutcome::DroppedOldest(dropped) => {
                    self.report_queue_overflow(&dropped, "oldest frame dropped to make room for a new one")
                        .await;
                    Ok(())
                }
                EnqueueOutcome::DroppedIncoming => {
                    self.report_queue_overflow("", "queue full, incoming frame dropped").await;
                    Ok(())
                }
                EnqueueOutcome::Enqueued => Ok(()),
            }
        }
    }

    async fn report_queue_overflow(&self, dropped_frame: &str, reason: &str) {
        let message_type = peek_message_type(dropped_frame);
        self.handlers
            .report_error(ClientErrorKind::Queue, message_type, reason.to_string())
            .await;
    }

    /// Send a request and await its correlated reply. The request timeout
    /// starts only once the frame is actually transmitted, not at enqueue
    /// time, so time spent disconnected does not eat into it.
    pub async fn request(
        &self,
        message_type: impl Into<String>,
        expected_reply_type: impl Into<String>,
        mut meta: Meta,
        payload: Option<Value>,
        progress_sender: Option<mpsc::UnboundedSender<Value>>,
    ) -> std::result::Result<RawEnvelope, ClientRequestError> {
        let correlation_id = Uuid::new_v4().to_string();
        normalize_outbound(&mut meta, Some(&correlation_id));

        let expected_reply_type = expected_reply_type.into();
        let receiver = self
            .requests
            .register(correlation_id.clone(), expected_reply_type, progress_sender)
            .await
            .map_err(|e| ClientRequestError::State(e.to_string()))?;

        let (sent_tx, sent_rx) = oneshot::channel();
        self.sent_signals.lock().await.insert(correlation_id.clone(), sent_tx);

        let envelope = RawEnvelope::new(message_type.into(), meta, payload);
        let text = serde_json::to_string(&envelope).map_err(|e| ClientRequestError::State(e.to_string()))?;

        let sent_immediately = self.state.current() == ConnectionState::Open;
        if sent_immediately {
            if self.transport.send_text(text).await.is_err() {
                self.requests.cancel(&correlation_id).await;
                return Err(ClientRequestError::ConnectionClosed);
            }
            if let Some(sender) = self.sent_signals.lock().await.remove(&correlation_id) {
                let _ = sender.send(());
            }
        } else {
            if matches!(self.queue.lock().await.enqueue(text), EnqueueOutcome::Rejected) {
                self.requests.cancel(&correlation_id).await;
                return Err(ClientRequestError::ConnectionClosed);
            }
        }

        let _ = sent_rx.await;

        match tokio::time::timeout(Duration::from_millis(self.config.request_timeout_ms), receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientRequestError::ConnectionClosed),
            Err(_) => {
                self.requests.cancel(&correlation_id).await;
                Err(ClientRequestError::Timeout)
            }
        }
    }
}

fn peek_correlation_id(frame: &str) -> Option<String> {
    let value: Value = serde_json::from_str(frame).ok()?;
    value.get("meta")?.get("correlationId")?.as_str().map(|s| s.to_string())
}

fn peek_message_type(frame: &str) -> Option<String> {
    let value: Value = serde_json::from_str(frame).ok()?;
    value.get("type")?.as_str().map(|s| s.to_string())
}
