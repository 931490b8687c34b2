//! Connection state machine.
//!
//! # State Transitions
//! ```text
//! Disconnected → Connecting:   ConnectRequested
//! Failed       → Connecting:   ConnectRequested
//! Connecting   → Ready:        Established
//! Connecting   → Reconnecting: ConnectFailed | ConnectionLost
//! Ready        → Reconnecting: ConnectionLost
//! Reconnecting → Reconnecting: ConnectFailed
//! Reconnecting → Ready:        Established
//! Reconnecting → Failed:       RetriesExhausted
//! any but Ended → Ended:       ShutdownRequested
//! ```
//!
//! Transitions are pure; the manager performs the I/O and feeds the outcome
//! back in as a [`StateTrigger`].

use std::fmt;

use serde::Serialize;

/// Lifecycle state of the shared connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Reconnecting,
    /// Retry budget spent; automatic reconnection has stopped.
    Failed,
    Ended,
}

/// Outcome of an I/O step that may move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTrigger {
    ConnectRequested,
    Established,
    ConnectFailed,
    ConnectionLost,
    RetriesExhausted,
    ShutdownRequested,
}

impl ConnectionState {
    /// Next state for `trigger`, or `None` when the transition is not allowed.
    pub fn on(self, trigger: StateTrigger) -> Option<ConnectionState> {
        use ConnectionState::*;
        use StateTrigger::*;

        match (self, trigger) {
            (Ended, _) => None,
            (_, ShutdownRequested) => Some(Ended),

            (Disconnected | Failed, ConnectRequested) => Some(Connecting),

            (Connecting | Reconnecting, Established) => Some(Ready),

            (Connecting, ConnectFailed | ConnectionLost) => Some(Reconnecting),
            (Ready, ConnectionLost) => Some(Reconnecting),
            (Reconnecting, ConnectFailed) => Some(Reconnecting),

            (Reconnecting, RetriesExhausted) => Some(Failed),

            _ => None,
        }
    }

    pub fn is_ready(self) -> bool {
        self == ConnectionState::Ready
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
            ConnectionState::Ended => "ended",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable lifecycle events published by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Transition {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A background connection error; never returned to unrelated callers.
    Error { message: String },
    RetriesExhausted { attempts: u32 },
}
