// ABOUTME: Validator-agnostic schema adapter contract (§4.1) plus one concrete jsonschema-backed impl
// ABOUTME: Router and client depend only on the MessageSchema trait, never on jsonschema directly

//! Any structural validation library can back a schema as long as it implements
//! [`MessageSchema`]. The source framework's `infer` type-projection hook has no
//! Rust equivalent with runtime type erasure; callers recover the concrete type
//! by calling [`crate::envelope::RawEnvelope::into_typed`] once validation has
//! confirmed the shape.

use crate::constants::RESERVED_META_KEYS;
use crate::error::{Result, WirelinkError};
use serde_json::Value;
use std::sync::Arc;

/// Outcome of validating an envelope's `meta`/`payload` against a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Ok,
    Err(Vec<String>),
}

impl ParseOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ParseOutcome::Ok)
    }

    pub fn issues(&self) -> &[String] {
        match self {
            ParseOutcome::Ok => &[],
            ParseOutcome::Err(issues) => issues,
        }
    }
}

/// The validator-agnostic contract the router and client depend on (§4.1).
pub trait MessageSchema: Send + Sync {
    /// `getMessageType(schema)` — the wire `type` string this schema is bound to.
    fn message_type(&self) -> &str;

    /// Whether this schema declares a payload at all (§3: payload presence must
    /// match the declaration exactly).
    fn has_payload(&self) -> bool;

    /// `safeParse(schema, meta)` for the `meta` object.
    fn validate_meta(&self, meta: &Value) -> ParseOutcome;

    /// `safeParse(schema, payload)` for the `payload` object, if declared.
    fn validate_payload(&self, payload: Option<&Value>) -> ParseOutcome;
}

/// A [`jsonschema`]-backed [`MessageSchema`], provided as one concrete
/// implementation of the validator adapter contract (feature `validation`).
#[cfg(feature = "validation")]
pub struct JsonMessageSchema {
    message_type: String,
    meta_validator: jsonschema::Validator,
    payload_validator: Option<jsonschema::Validator>,
}

#[cfg(feature = "validation")]
impl JsonMessageSchema {
    /// Build a schema from JSON Schema documents for `meta` and (optionally)
    /// `payload`. Both are compiled with strict (`additionalProperties: false`)
    /// semantics forced on, per §4.1. Fails if `meta_schema` declares either
    /// reserved key (`clientId`, `receivedAt`) as a property (schema-creation
    /// error, §3).
    pub fn new(
        message_type: impl Into<String>,
        meta_schema: Value,
        payload_schema: Option<Value>,
    ) -> Result<Arc<dyn MessageSchema>> {
        let message_type = message_type.into();

        if let Some(conflict) = find_reserved_key_conflict(&meta_schema) {
            return Err(WirelinkError::validation(format!(
                "schema '{}' declares reserved meta key '{}', which is server-managed",
                message_type, conflict
            )));
        }

        let meta_schema = force_strict(meta_schema);
        let meta_validator = jsonschema::options()
            .should_validate_formats(true)
            .build(&meta_schema)
            .map_err(|e| {
                WirelinkError::validation(format!("invalid meta schema for '{}': {}", message_type, e))
            })?;

        let payload_validator = payload_schema
            .map(force_strict)
            .map(|schema| {
                jsonschema::options()
                    .should_validate_formats(true)
                    .build(&schema)
                    .map_err(|e| {
                        WirelinkError::validation(format!(
                            "invalid payload schema for '{}': {}",
                            message_type, e
                        ))
                    })
            })
            .transpose()?;

        Ok(Arc::new(Self {
            message_type,
            meta_validator,
            payload_validator,
        }))
    }
}

#[cfg(feature = "validation")]
impl MessageSchema for JsonMessageSchema {
    fn message_type(&self) -> &str {
        &self.message_type
    }

    fn has_payload(&self) -> bool {
        self.payload_validator.is_some()
    }

    fn validate_meta(&self, meta: &Value) -> ParseOutcome {
        match self.meta_validator.validate(meta) {
            Ok(()) => ParseOutcome::Ok,
            Err(e) => ParseOutcome::Err(vec![e.to_string()]),
        }
    }

    fn validate_payload(&self, payload: Option<&Value>) -> ParseOutcome {
        match (&self.payload_validator, payload) {
            (None, None) => ParseOutcome::Ok,
            (None, Some(_)) => {
                ParseOutcome::Err(vec![format!("'{}' declares no payload", self.message_type)])
            }
            (Some(_), None) => {
                ParseOutcome::Err(vec![format!("'{}' requires a payload", self.message_type)])
            }
            (Some(validator), Some(value)) => match validator.validate(value) {
                Ok(()) => ParseOutcome::Ok,
                Err(e) => ParseOutcome::Err(vec![e.to_string()]),
            },
        }
    }
}

#[cfg(feature = "validation")]
fn find_reserved_key_conflict(schema: &Value) -> Option<String> {
    let properties = schema.get("properties")?.as_object()?;
    RESERVED_META_KEYS
        .iter()
        .find(|key| properties.contains_key(**key))
        .map(|key| key.to_string())
}

/// Force `additionalProperties: false` on an object schema unless the caller
/// already set it explicitly.
#[cfg(feature = "validation")]
fn force_strict(mut schema: Value) -> Value {
    if let Some(obj) = schema.as_object_mut() {
        obj.entry("additionalProperties")
            .or_insert_with(|| Value::Bool(false));
    }
    schema
}

#[cfg(all(test, feature = "validation"))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_creation_rejects_reserved_meta_key() {
        let meta_schema = json!({
            "type": "object",
            "properties": { "clientId": {"type": "string"} }
        });
        let result = JsonMessageSchema::new("PING", meta_schema, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_strict_meta_rejects_unknown_keys() {
        let meta_schema = json!({
            "type": "object",
            "properties": { "room": {"type": "string"} },
            "required": ["room"]
        });
        let schema = JsonMessageSchema::new("JOIN", meta_schema, None).unwrap();

        let valid = json!({"room": "lobby"});
        assert!(schema.validate_meta(&valid).is_ok());

        let with_unknown_key = json!({"room": "lobby", "sneaky": true});
        assert!(!schema.validate_meta(&with_unknown_key).is_ok());
    }

    #[test]
    fn test_payload_presence_must_match_declaration() {
        let meta_schema = json!({"type": "object", "properties": {}});
        let no_payload_schema = JsonMessageSchema::new("EVENT", meta_schema.clone(), None).unwrap();
        assert!(!no_payload_schema
            .validate_payload(Some(&json!({"x": 1})))
            .is_ok());

        let payload_schema = json!({
            "type": "object",
            "properties": {"id": {"type": "number"}},
            "required": ["id"]
        });
        let with_payload_schema =
            JsonMessageSchema::new("EVENT2", meta_schema, Some(payload_schema)).unwrap();
        assert!(!with_payload_schema.validate_payload(None).is_ok());
        assert!(with_payload_schema
            .validate_payload(Some(&json!({"id": 1})))
            .is_ok());
    }
}
