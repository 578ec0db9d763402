// ABOUTME: Client-side transport abstraction (§4.6) — the host binds this to a real WebSocket client
// ABOUTME: InMemoryTransport is the test double this crate ships; it is never wired to a real socket

//! The client state machine only needs to connect, send, and receive frames
//! on an ordered, reliable, message-oriented channel; it never constructs a
//! `ws://` URL or speaks the HTTP upgrade handshake itself. A host binds
//! [`ClientTransport`] to whatever WebSocket client library it already uses.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseEvent {
    Normal,
    Abnormal,
}

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message(String),
    Closed(CloseEvent),
}

#[async_trait]
pub trait ClientTransport: Send + Sync {
    /// Establish the connection, attaching `subprotocols` (auth mode
    /// `subprotocol`) or leaving them empty.
    async fn connect(&self, url: &str, subprotocols: &[String]) -> crate::error::Result<()>;

    async fn send_text(&self, text: String) -> crate::error::Result<()>;

    /// Await the next inbound frame or close notification.
    async fn next_event(&self) -> Option<TransportEvent>;

    async fn close(&self, code: u16, reason: &str) -> crate::error::Result<()>;
}

/// In-memory transport test double. `inject_message`/`inject_close` let tests
/// drive the client state machine without a real socket.
pub struct InMemoryTransport {
    connect_urls: Mutex<Vec<String>>,
    sent: Mutex<Vec<String>>,
    events: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    sender: mpsc::UnboundedSender<TransportEvent>,
    fail_connect: std::sync::atomic::AtomicBool,
    backlog: Mutex<VecDeque<TransportEvent>>,
}

impl InMemoryTransport {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            connect_urls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            events: Mutex::new(receiver),
            sender,
            fail_connect: std::sync::atomic::AtomicBool::new(false),
            backlog: Mutex::new(VecDeque::new()),
        })
    }

    pub fn set_fail_next_connect(&self, fail: bool) {
        self.fail_connect.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn inject_message(&self, text: impl Into<String>) {
        let _ = self.sender.send(TransportEvent::Message(text.into()));
    }

    pub async fn inject_close(&self, event: CloseEvent) {
        let _ = self.sender.send(TransportEvent::Closed(event));
    }

    pub async fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().await.clone()
    }

    pub async fn connect_urls(&self) -> Vec<String> {
        self.connect_urls.lock().await.clone()
    }
}

#[async_trait]
impl ClientTransport for InMemoryTransport {
    async fn connect(&self, url: &str, _subprotocols: &[String]) -> crate::error::Result<()> {
        if self.fail_connect.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::error::WirelinkError::transport("injected connect failure"));
        }
        self.connect_urls.lock().await.push(url.to_string());
        Ok(())
    }

    async fn send_text(&self, text: String) -> crate::error::Result<()> {
        self.sent.lock().await.push(text);
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        if let Some(event) = self.backlog.lock().await.pop_front() {
            return Some(event);
        }
        self.events.lock().await.recv().await
    }

    async fn close(&self, _code: u16, _reason: &str) -> crate::error::Result<()> {
        let _ = self.sender.send(TransportEvent::Closed(CloseEvent::Normal));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_records_url() {
        let transport = InMemoryTransport::new();
        transport.connect("mem://host", &[]).await.unwrap();
        assert_eq!(transport.connect_urls().await, vec!["mem://host".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_message_is_delivered_via_next_event() {
        let transport = InMemoryTransport::new();
        transport.inject_message("hello").await;
        match transport.next_event().await {
            Some(TransportEvent::Message(text)) => assert_eq!(text, "hello"),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
