//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Build manager → initialize() → Build limiter → Serve
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Cache manager shutdown() → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then cache, then listeners
//! - Shutdown is idempotent; repeated signals are absorbed

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{bootstrap, Services, StartupError};
