//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → contact.rs: request.rs (client id) → rate limiter → validate → sink
//!     → health.rs: connection manager health_check()
//!     → response.rs (errors, 429 + Retry-After)
//! ```

pub mod contact;
pub mod health;
pub mod request;
pub mod response;
pub mod server;

pub use contact::{ContactMessage, ContactSink, LogSink, SinkError};
pub use server::{build_router, AppState, HttpServer};
