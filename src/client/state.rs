// ABOUTME: Client connection state machine and reconnect backoff (§4.6)
// ABOUTME: Backoff: delay = min(maxDelayMs, initialDelayMs * 2^(attempt-1)), with full jitter

use crate::constants::{
    DEFAULT_INITIAL_RECONNECT_DELAY_MS, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_MAX_RECONNECT_DELAY_MS,
};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Closing,
    Reconnecting,
}

#[derive(Debug, Clone, Copy)]
pub enum JitterMode {
    None,
    Full,
}

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub jitter: JitterMode,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_RECONNECT_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_RECONNECT_DELAY_MS,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            jitter: JitterMode::Full,
        }
    }
}

impl BackoffConfig {
    /// `delay = min(maxDelayMs, initialDelayMs * 2^(attempt-1))`, `attempt` is 1-based.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let exponential = self
            .initial_delay_ms
            .saturating_mul(1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX));
        let capped = exponential.min(self.max_delay_ms);
        match self.jitter {
            JitterMode::None => capped,
            JitterMode::Full => {
                if capped == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=capped)
                }
            }
        }
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

/// Tracks the client's connection state and whether the most recent close was
/// caller-initiated (`manual_close`, which suppresses reconnection).
pub struct StateMachine {
    state: watch::Sender<ConnectionState>,
    manual_close: AtomicBool,
    attempt: AtomicU32,
    connecting_guard: Mutex<()>,
}

impl StateMachine {
    pub fn new() -> Arc<Self> {
        let (sender, _) = watch::channel(ConnectionState::Closed);
        Arc::new(Self {
            state: sender,
            manual_close: AtomicBool::new(false),
            attempt: AtomicU32::new(0),
            connecting_guard: Mutex::new(()),
        })
    }

    pub fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn set(&self, state: ConnectionState) {
        let _ = self.state.send(state);
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Resolves as soon as the state is or becomes `Open`.
    pub async fn once_open(&self) {
        let mut receiver = self.state.subscribe();
        if *receiver.borrow() == ConnectionState::Open {
            return;
        }
        while receiver.changed().await.is_ok() {
            if *receiver.borrow() == ConnectionState::Open {
                return;
            }
        }
    }

    pub fn mark_manual_close(&self, manual: bool) {
        self.manual_close.store(manual, Ordering::SeqCst);
    }

    pub fn is_manual_close(&self) -> bool {
        self.manual_close.load(Ordering::SeqCst)
    }

    pub fn next_attempt(&self) -> u32 {
        self.attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset_attempts(&self) {
        self.attempt.store(0, Ordering::SeqCst);
    }

    /// Idempotent guard: only one caller at a time proceeds past this point
    /// while already `Connecting`/`Reconnecting`/`Open`.
    pub async fn try_begin_connect(&self) -> bool {
        let _guard = self.connecting_guard.lock().await;
        match self.current() {
            ConnectionState::Closed | ConnectionState::Reconnecting => {
                self.set(ConnectionState::Connecting);
                true
            }
            _ => false,
        }
    }
}
