// ABOUTME: Framework-wide constants and default values
// ABOUTME: Wire-level special types, reserved meta keys, and default tunables

//! Constants shared across the envelope, router, pub/sub, and client modules.

/// Reserved `meta` keys: server-managed, forbidden in user-defined schemas, and
/// stripped from any client-supplied meta before validation (§4.1).
pub const RESERVED_META_KEYS: &[&str] = &["clientId", "receivedAt"];

/// Legacy unstructured error reply type.
pub const TYPE_ERROR: &str = "ERROR";

/// Structured, gRPC-aligned error reply type.
pub const TYPE_RPC_ERROR: &str = "RPC_ERROR";

/// Non-terminal RPC progress frame type.
pub const TYPE_RPC_PROGRESS: &str = "$ws:rpc-progress";

/// Default RPC request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default cap on concurrently pending client requests.
pub const DEFAULT_MAX_PENDING_REQUESTS: usize = 1_000;

/// Default outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000;

/// Default cap on subscriptions per connection.
pub const DEFAULT_MAX_TOPICS_PER_CONNECTION: usize = 1_000;

/// Default initial reconnect backoff delay.
pub const DEFAULT_INITIAL_RECONNECT_DELAY_MS: u64 = 250;

/// Default reconnect backoff ceiling.
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Default maximum reconnect attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Default auth query parameter name.
pub const DEFAULT_AUTH_QUERY_PARAM: &str = "access_token";

/// Default auth subprotocol prefix.
pub const DEFAULT_AUTH_SUBPROTOCOL_PREFIX: &str = "bearer.";

/// WebSocket close code for orderly, client-initiated close.
pub const CLOSE_CODE_NORMAL: u16 = 1000;

/// WebSocket close code signalling unexpected loss (triggers reconnect).
pub const CLOSE_CODE_ABNORMAL: u16 = 1006;

/// Key the pub/sub plugin writes to exclude the publishing connection from fan-out.
pub const META_KEY_EXCLUDE_CLIENT_ID: &str = "excludeClientId";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys_are_exactly_client_id_and_received_at() {
        assert_eq!(RESERVED_META_KEYS, &["clientId", "receivedAt"]);
    }
}
