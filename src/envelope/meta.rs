// ABOUTME: Envelope metadata container: a strict JSON object with typed accessors
// ABOUTME: for the standard fields plus pass-through storage for schema-defined extensions

//! `meta` is schema-extensible: the core only standardizes `timestamp`,
//! `correlationId`, and the two server-managed reserved keys. Everything else a
//! schema adds lives in the same map untouched by the core.

use crate::constants::RESERVED_META_KEYS;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const KEY_TIMESTAMP: &str = "timestamp";
const KEY_CORRELATION_ID: &str = "correlationId";
const KEY_CLIENT_ID: &str = "clientId";
const KEY_RECEIVED_AT: &str = "receivedAt";

/// The `meta` object carried by every envelope.
///
/// Backed by a plain JSON object rather than a fixed struct: schemas are free to
/// extend `meta` with additional fields, and strictness (rejecting unknown keys)
/// is enforced by the schema's validator, not by this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meta(Map<String, Value>);

impl Meta {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.0.get(KEY_TIMESTAMP).and_then(Value::as_i64)
    }

    pub fn set_timestamp(&mut self, epoch_ms: i64) {
        self.insert(KEY_TIMESTAMP, Value::from(epoch_ms));
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.0.get(KEY_CORRELATION_ID).and_then(Value::as_str)
    }

    pub fn set_correlation_id(&mut self, correlation_id: impl Into<String>) {
        self.insert(KEY_CORRELATION_ID, Value::from(correlation_id.into()));
    }

    pub fn client_id(&self) -> Option<&str> {
        self.0.get(KEY_CLIENT_ID).and_then(Value::as_str)
    }

    pub fn set_client_id(&mut self, client_id: impl Into<String>) {
        self.insert(KEY_CLIENT_ID, Value::from(client_id.into()));
    }

    pub fn received_at(&self) -> Option<i64> {
        self.0.get(KEY_RECEIVED_AT).and_then(Value::as_i64)
    }

    pub fn set_received_at(&mut self, epoch_ms: i64) {
        self.insert(KEY_RECEIVED_AT, Value::from(epoch_ms));
    }

    /// Remove every reserved key (`clientId`, `receivedAt`). Used on both the
    /// inbound (server) and outbound (client) normalization paths.
    pub fn strip_reserved(&mut self) {
        for key in RESERVED_META_KEYS {
            self.0.remove(*key);
        }
    }
}

impl From<Map<String, Value>> for Meta {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_reserved_removes_only_reserved_keys() {
        let mut meta = Meta::new();
        meta.set_client_id("forged");
        meta.set_received_at(0);
        meta.set_correlation_id("r1");
        meta.strip_reserved();

        assert!(meta.client_id().is_none());
        assert!(meta.received_at().is_none());
        assert_eq!(meta.correlation_id(), Some("r1"));
    }

    #[test]
    fn test_roundtrip_through_json() {
        let mut meta = Meta::new();
        meta.set_timestamp(123);
        meta.insert("room", Value::from("lobby"));

        let json = serde_json::to_value(&meta).unwrap();
        let restored: Meta = serde_json::from_value(json).unwrap();
        assert_eq!(restored.timestamp(), Some(123));
        assert_eq!(restored.get("room"), Some(&Value::from("lobby")));
    }
}
