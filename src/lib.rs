//! Shared cache connection manager and fixed-window rate limiter.

pub mod config;
pub mod connection;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod store;

pub use config::AppConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use lifecycle::Shutdown;
pub use security::{RateLimitDecision, RateLimitPolicy, RateLimiter};
