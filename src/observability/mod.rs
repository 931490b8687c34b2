//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Connection manager, rate limiter, HTTP layer produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Background connection errors surface here, never as caller errors
//! - Metrics are cheap (atomic increments behind the facade)

pub mod logging;
pub mod metrics;
