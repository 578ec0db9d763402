// ABOUTME: Envelope container and fluent builder
// ABOUTME: Wire format is {type, meta, payload?} with payload omitted entirely when absent

//! The envelope container (§3) and its builder.

use super::meta::Meta;
use crate::error::{Result, WirelinkError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{type, meta, payload?}`, the uniform wire object (§3).
///
/// `payload` is skipped entirely on the wire when `None` rather than serialized
/// as `null`: the spec requires the key be *absent* when a schema declares no
/// payload, and present when one is declared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope<T> {
    #[serde(rename = "type")]
    pub message_type: String,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

/// Envelope before schema validation: payload is still opaque JSON.
pub type RawEnvelope = Envelope<Value>;

impl<T> Envelope<T> {
    pub fn new(message_type: impl Into<String>, meta: Meta, payload: Option<T>) -> Self {
        Self {
            message_type: message_type.into(),
            meta,
            payload,
        }
    }

    pub fn event(message_type: impl Into<String>, meta: Meta, payload: T) -> Self {
        Self::new(message_type, meta, Some(payload))
    }

    pub fn builder(message_type: impl Into<String>) -> EnvelopeBuilder<T> {
        EnvelopeBuilder::new(message_type)
    }

    pub fn extract(self) -> (Meta, Option<T>) {
        (self.meta, self.payload)
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

impl RawEnvelope {
    /// Re-interpret the opaque JSON payload as `T` once a schema has validated it.
    pub fn into_typed<T>(self) -> Result<Envelope<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let payload = match self.payload {
            Some(value) => Some(serde_json::from_value(value).map_err(|e| {
                WirelinkError::serialization(format!("failed to decode payload: {}", e))
            })?),
            None => None,
        };
        Ok(Envelope {
            message_type: self.message_type,
            meta: self.meta,
            payload,
        })
    }
}

/// Fluent builder for [`Envelope`].
#[derive(Debug)]
pub struct EnvelopeBuilder<T> {
    message_type: String,
    meta: Meta,
    payload: Option<T>,
}

impl<T> EnvelopeBuilder<T> {
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            meta: Meta::new(),
            payload: None,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_payload(mut self, payload: T) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn build(self) -> Envelope<T> {
        Envelope {
            message_type: self.message_type,
            meta: self.meta,
            payload: self.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        id: u32,
    }

    #[test]
    fn test_payload_omitted_entirely_when_none() {
        let envelope: Envelope<Ping> = Envelope::builder("NO_PAYLOAD").build();
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(!json.as_object().unwrap().contains_key("payload"));
    }

    #[test]
    fn test_payload_present_when_declared() {
        let envelope = Envelope::builder("PING").with_payload(Ping { id: 1 }).build();
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["payload"], json!({"id": 1}));
    }

    #[test]
    fn test_raw_envelope_into_typed_decodes_payload() {
        let raw = RawEnvelope::new("PING", Meta::new(), Some(json!({"id": 7})));
        let typed: Envelope<Ping> = raw.into_typed().unwrap();
        assert_eq!(typed.payload, Some(Ping { id: 7 }));
    }

    #[test]
    fn test_raw_envelope_into_typed_preserves_absent_payload() {
        let raw = RawEnvelope::new("NO_PAYLOAD", Meta::new(), None);
        let typed: Envelope<Ping> = raw.into_typed().unwrap();
        assert!(typed.payload.is_none());
    }

    #[test]
    fn test_unknown_root_level_key_is_rejected() {
        let json = json!({
            "type": "PING",
            "meta": {},
            "payload": {"id": 1},
            "sneaky": true
        });
        let result: std::result::Result<RawEnvelope, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
