//! Shared cache connection subsystem.
//!
//! # Data Flow
//! ```text
//! initialize():
//!     Disconnected → Connecting
//!     → connect (deadline) → self-test write+read (deadline)
//!     → Ready                      on success
//!     → Reconnecting + error       on failure (supervisor keeps retrying)
//!
//! Command failure / keep-alive probe failure:
//!     Ready → Reconnecting → supervisor.rs reconnect episode
//!     → Ready (budget reset) | Failed (budget exhausted)
//!
//! shutdown():
//!     cancel supervisor → close connection → Ended
//! ```
//!
//! # Design Decisions
//! - state.rs holds the pure transition table; manager.rs does the I/O
//! - Background errors are logged and published as events, never returned
//!   to unrelated callers
//! - Only `initialize()` returns an error, so startup can decide to abort
//! - Callers queued behind a connect attempt share its outcome instead of
//!   repeating it

pub mod manager;
pub mod state;
mod supervisor;

pub use manager::{ConnectionHandle, ConnectionManager, InitializationError, LiveConnection, ManagerSettings};
pub use state::{ConnectionEvent, ConnectionState, StateTrigger};
