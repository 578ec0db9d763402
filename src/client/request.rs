// ABOUTME: Request/reply correlation tracker: four-way reply dispatch keyed by correlationId (§4.8)
// ABOUTME: A reply, RPC_ERROR, legacy ERROR, or progress frame are the only four terminal/non-terminal kinds

//! `request()` registers a pending entry keyed by `correlationId` before the
//! frame is sent; [`RequestTracker::dispatch`] resolves it against whichever
//! of the four reply shapes arrives first. Progress frames are the only
//! non-terminal case — they do not remove the pending entry.

use crate::constants::{TYPE_ERROR, TYPE_RPC_ERROR, TYPE_RPC_PROGRESS};
use crate::envelope::RawEnvelope;
use crate::error::{Result, WirelinkError};
use crate::rpc::{RpcError, ServerErrorPayload};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

#[derive(Debug, Clone)]
pub enum ClientRequestError {
    Rpc(RpcError),
    Server { message: String, code: Option<String> },
    Validation(String),
    Timeout,
    ConnectionClosed,
    State(String),
}

impl std::fmt::Display for ClientRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientRequestError::Rpc(e) => write!(f, "rpc error: {} ({:?})", e.message, e.code),
            ClientRequestError::Server { message, .. } => write!(f, "server error: {}", message),
            ClientRequestError::Validation(msg) => write!(f, "validation error: {}", msg),
            ClientRequestError::Timeout => write!(f, "request timed out"),
            ClientRequestError::ConnectionClosed => write!(f, "connection closed before a reply arrived"),
            ClientRequestError::State(msg) => write!(f, "state error: {}", msg),
        }
    }
}

impl std::error::Error for ClientRequestError {}

pub type ClientRequestResult = std::result::Result<RawEnvelope, ClientRequestError>;

struct PendingRequest {
    expected_reply_type: String,
    reply_sender: Option<oneshot::Sender<ClientRequestResult>>,
    progress_sender: Option<mpsc::UnboundedSender<Value>>,
}

/// Tracks in-flight RPC requests by `correlationId` and resolves them as
/// replies arrive (§4.8).
pub struct RequestTracker {
    max_pending: usize,
    pending: Mutex<HashMap<String, PendingRequest>>,
}

impl RequestTracker {
    pub fn new(max_pending: usize) -> Arc<Self> {
        Arc::new(Self {
            max_pending,
            pending: Mutex::new(HashMap::new()),
        })
    }

    pub async fn register(
        &self,
        correlation_id: String,
        expected_reply_type: String,
        progress_sender: Option<mpsc::UnboundedSender<Value>>,
    ) -> Result<oneshot::Receiver<ClientRequestResult>> {
        let mut guard = self.pending.lock().await;
        if guard.len() >= self.max_pending {
            return Err(WirelinkError::resource_exhausted(format!(
                "max pending requests ({}) reached",
                self.max_pending
            )));
        }
        let (sender, receiver) = oneshot::channel();
        guard.insert(
            correlation_id,
            PendingRequest {
                expected_reply_type,
                reply_sender: Some(sender),
                progress_sender,
            },
        );
        Ok(receiver)
    }

    pub async fn cancel(&self, correlation_id: &str) {
        self.pending.lock().await.remove(correlation_id);
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Dispatch an inbound envelope against the pending table. Returns `true`
    /// if it was claimed by a pending request (terminally or as progress).
    pub async fn dispatch(&self, envelope: &RawEnvelope) -> bool {
        let correlation_id = match envelope.meta.correlation_id() {
            Some(id) => id.to_string(),
            None => return false,
        };

        if envelope.message_type == TYPE_RPC_PROGRESS {
            let guard = self.pending.lock().await;
            if let Some(pending) = guard.get(&correlation_id) {
                if let (Some(sender), Some(payload)) = (&pending.progress_sender, &envelope.payload) {
                    let _ = sender.send(payload.clone());
                }
                return true;
            }
            return false;
        }

        let mut guard = self.pending.lock().await;
        let pending = match guard.remove(&correlation_id) {
            Some(p) => p,
            None => return false,
        };
        drop(guard);

        let outcome: ClientRequestResult = if envelope.message_type == pending.expected_reply_type {
            Ok(envelope.clone())
        } else if envelope.message_type == TYPE_RPC_ERROR {
            match envelope
                .payload
                .clone()
                .map(serde_json::from_value::<RpcError>)
            {
                Some(Ok(rpc_error)) => Err(ClientRequestError::Rpc(rpc_error)),
                _ => Err(ClientRequestError::State("malformed RPC_ERROR payload".to_string())),
            }
        } else if envelope.message_type == TYPE_ERROR {
            match envelope
                .payload
                .clone()
                .map(serde_json::from_value::<ServerErrorPayload>)
            {
                Some(Ok(err)) => Err(ClientRequestError::Server {
                    message: err.message,
                    code: err.code,
                }),
                _ => Err(ClientRequestError::State("malformed ERROR payload".to_string())),
            }
        } else {
            Err(ClientRequestError::Validation(format!(
                "expected reply type '{}' but received '{}' for correlationId '{}'",
                pending.expected_reply_type, envelope.message_type, correlation_id
            )))
        };

        if let Some(sender) = pending.reply_sender {
            let _ = sender.send(outcome);
        }
        true
    }

    /// Fail every still-pending request, e.g. on connection close.
    pub async fn fail_all(&self, error: ClientRequestError) {
        let mut guard = self.pending.lock().await;
        for (_, pending) in guard.drain() {
            if let Some(sender) = pending.reply_sender {
                let _ = sender.send(Err(error.clone()));
            }
        }
    }
}
