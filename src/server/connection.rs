// ABOUTME: Host integration surface (§4.3) — the trait a real socket library binds to a clientId
// ABOUTME: InMemoryConnection is the test double this crate ships; it is never wired to a real socket

//! The WebSocket transport itself is out of scope: the router only needs to
//! push bytes to an already-accepted connection and to know when it closes.
//! A host application implements [`ServerConnection`] over whatever socket
//! library it already uses (axum, tokio-tungstenite, warp, ...) and registers
//! the resulting handle in a [`ConnectionRegistry`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[async_trait]
pub trait ServerConnection: Send + Sync {
    fn client_id(&self) -> &str;

    /// Push one already-serialized frame to this connection's peer.
    async fn send_text(&self, text: String) -> crate::error::Result<()>;

    async fn close(&self, code: u16, reason: &str) -> crate::error::Result<()>;
}

/// clientId → connection lookup, maintained by the router across
/// `onOpen`/`onClose`.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<dyn ServerConnection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection: Arc<dyn ServerConnection>) {
        self.connections
            .write()
            .await
            .insert(connection.client_id().to_string(), connection);
    }

    pub async fn unregister(&self, client_id: &str) {
        self.connections.write().await.remove(client_id);
    }

    pub async fn get(&self, client_id: &str) -> Option<Arc<dyn ServerConnection>> {
        self.connections.read().await.get(client_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }
}

/// In-memory test double: records every frame sent to it instead of touching
/// a real socket.
pub struct InMemoryConnection {
    client_id: String,
    sent: Mutex<Vec<String>>,
    closed: Mutex<Option<(u16, String)>>,
}

impl InMemoryConnection {
    pub fn new(client_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            client_id: client_id.into(),
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(None),
        })
    }

    pub async fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().await.clone()
    }

    pub async fn close_reason(&self) -> Option<(u16, String)> {
        self.closed.lock().await.clone()
    }
}

#[async_trait]
impl ServerConnection for InMemoryConnection {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn send_text(&self, text: String) -> crate::error::Result<()> {
        self.sent.lock().await.push(text);
        Ok(())
    }

    async fn close(&self, code: u16, reason: &str) -> crate::error::Result<()> {
        *self.closed.lock().await = Some((code, reason.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_register_and_get() {
        let registry = ConnectionRegistry::new();
        let conn = InMemoryConnection::new("c1");
        registry.register(conn.clone()).await;
        assert!(registry.get("c1").await.is_some());
        registry.unregister("c1").await;
        assert!(registry.get("c1").await.is_none());
    }

    #[tokio::test]
    async fn test_in_memory_connection_records_sent_frames() {
        let conn = InMemoryConnection::new("c1");
        conn.send_text("hello".to_string()).await.unwrap();
        assert_eq!(conn.sent_frames().await, vec!["hello".to_string()]);
    }
}
