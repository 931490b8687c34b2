//! Key-value store abstraction.
//!
//! # Data Flow
//! ```text
//! ConnectionManager
//!     → StoreConnector::connect (one call per connect attempt)
//!     → Box<dyn StoreConnection> (held by the manager, shared via Arc)
//!     → redis.rs (production) | memory.rs (local / test double)
//! ```
//!
//! # Design Decisions
//! - The manager only sees the traits, so its state machine can be driven
//!   by an in-memory double in tests
//! - `incr_and_ttl` is one indivisible batch; implementations must not
//!   split it into separate round trips

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use self::redis::RedisConnector;

/// Errors raised by store round trips.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("command failed: {0}")]
    Command(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed")]
    Closed,
}

/// Opens connections to a store.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError>;

    /// Endpoint description for logs; never includes credentials.
    fn endpoint(&self) -> String;
}

/// A live, shareable connection.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Atomically increment `key` and read its TTL in one batch.
    ///
    /// Returns `(count, ttl_secs)` where `ttl_secs` follows the Redis `TTL`
    /// convention: `-1` when the key has no expiry.
    async fn incr_and_ttl(&self, key: &str) -> Result<(i64, i64), StoreError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Close after pending replies have been delivered.
    async fn close(&self) -> Result<(), StoreError>;
}
