//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Store round trip:
//!     → timeouts.rs (enforce connect/command deadline)
//!     → On connection loss: retries.rs (count attempts, check budget)
//!     → backoff.rs (delay before the next reconnect attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every store call has a deadline
//! - Reconnect attempts are bounded; an exhausted budget stops retrying
//! - Delay policies are pure functions, testable without a network

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::BackoffStrategy;
pub use retries::RetryBudget;
