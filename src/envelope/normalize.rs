// ABOUTME: The two symmetric normalization passes that form the trust boundary (§4.1)
// ABOUTME: between untrusted callers and the routing layer, inbound and outbound

//! Inbound (server) and outbound (client) meta normalization.
//!
//! These two functions are the security boundary described in §4.1: every
//! envelope that enters the router, and every envelope the client hands to the
//! transport, passes through exactly one of them.

use super::meta::Meta;
use crate::time::now_ms;

/// Inbound normalization (server): strip any reserved keys the client supplied,
/// then assign the server-managed `clientId` and `receivedAt`.
pub fn normalize_inbound(meta: &mut Meta, client_id: &str) {
    meta.strip_reserved();
    meta.set_client_id(client_id);
    meta.set_received_at(now_ms());
}

/// Outbound normalization (client): strip reserved keys plus `correlationId`
/// from user-supplied meta, inject `timestamp` if absent, then set
/// `correlationId` exclusively from the caller-supplied option (never from user
/// meta, which was just stripped).
pub fn normalize_outbound(meta: &mut Meta, correlation_id: Option<&str>) {
    meta.strip_reserved();
    meta.remove("correlationId");
    if meta.timestamp().is_none() {
        meta.set_timestamp(now_ms());
    }
    if let Some(correlation_id) = correlation_id {
        meta.set_correlation_id(correlation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_inbound_normalization_strips_client_supplied_reserved_keys() {
        let mut meta = Meta::new();
        meta.set_client_id("forged");
        meta.set_received_at(0);

        normalize_inbound(&mut meta, "real-client-1");

        assert_eq!(meta.client_id(), Some("real-client-1"));
        assert!(meta.received_at().is_some());
        assert_ne!(meta.received_at(), Some(0));
    }

    #[test]
    fn test_outbound_normalization_strips_reserved_and_ignores_user_correlation_id() {
        let mut meta = Meta::new();
        meta.set_client_id("forged");
        meta.set_received_at(0);
        meta.set_correlation_id("user-supplied");

        normalize_outbound(&mut meta, Some("r1"));

        assert!(meta.client_id().is_none());
        assert!(meta.received_at().is_none());
        assert_eq!(meta.correlation_id(), Some("r1"));
        assert!(meta.timestamp().is_some());
    }

    #[test]
    fn test_outbound_normalization_without_opts_correlation_id_has_none() {
        let mut meta = Meta::new();
        meta.set_correlation_id("should-be-dropped");

        normalize_outbound(&mut meta, None);

        assert_eq!(meta.get("correlationId"), None::<&Value>);
    }

    #[test]
    fn test_outbound_normalization_preserves_explicit_timestamp() {
        let mut meta = Meta::new();
        meta.set_timestamp(42);

        normalize_outbound(&mut meta, None);

        assert_eq!(meta.timestamp(), Some(42));
    }
}
