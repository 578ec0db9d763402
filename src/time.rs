// ABOUTME: Tiny epoch-millisecond time helper shared by envelope normalization and the client
// ABOUTME: Centralized so tests can reason about a single clock source

//! Wall-clock helper. Kept as a single function so normalization call sites read
//! `time::now_ms()` rather than reaching for `chrono` directly everywhere.

use chrono::Utc;

/// Current time as epoch milliseconds, the wire format for `meta.timestamp` /
/// `meta.receivedAt`.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_positive_and_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(a > 0);
        assert!(b >= a);
    }
}
