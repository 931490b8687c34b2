//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Public write endpoint (e.g. contact form):
//!     → rate_limit.rs (INCR + TTL batch on {prefix}:{client})
//!     → limited: reject with 429
//!     → store unavailable: allow (fail open) and log
//! ```
//!
//! # Design Decisions
//! - Fixed windows: the TTL is set once per window, never extended
//! - Fail open: an unreachable store must not lock out legitimate users

pub mod rate_limit;

pub use rate_limit::{PolicyError, RateLimitDecision, RateLimitError, RateLimitPolicy, RateLimiter};
