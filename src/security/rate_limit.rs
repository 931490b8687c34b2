//! Fixed-window rate limiting backed by the shared cache connection.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::connection::ConnectionManager;
use crate::observability::metrics::{self, CheckOutcome};
use crate::resilience::timeouts::with_deadline;
use crate::store::StoreError;

/// Caller-supplied limit for one class of requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    limit: u32,
    window: Duration,
    prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("rate limit must be greater than zero")]
    ZeroLimit,
    #[error("rate limit window must be at least one second")]
    ZeroWindow,
}

impl RateLimitPolicy {
    pub fn new(limit: u32, window_secs: u64, prefix: impl Into<String>) -> Result<Self, PolicyError> {
        if limit == 0 {
            return Err(PolicyError::ZeroLimit);
        }
        if window_secs == 0 {
            return Err(PolicyError::ZeroWindow);
        }
        Ok(Self {
            limit,
            window: Duration::from_secs(window_secs),
            prefix: prefix.into(),
        })
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self, PolicyError> {
        Self::new(config.limit, config.window_secs, config.prefix.clone())
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Store key for `identifier`: `{prefix}:{identifier}`.
    pub fn key(&self, identifier: &str) -> String {
        format!("{}:{}", self.prefix, identifier)
    }
}

/// Result of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub limited: bool,
    pub remaining: u32,
    /// Time until the current window closes, when known.
    #[serde(skip)]
    pub reset_after: Option<Duration>,
}

impl RateLimitDecision {
    fn fail_open(policy: &RateLimitPolicy) -> Self {
        Self {
            limited: false,
            remaining: policy.limit,
            reset_after: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit identifier must not be empty")]
    EmptyIdentifier,
}

/// Why a check could not consult the store.
#[derive(Debug)]
enum Unavailable {
    NotReady,
    Store(StoreError),
}

/// Fixed-window limiter. Cheap to clone; all clones share the manager.
#[derive(Clone)]
pub struct RateLimiter {
    manager: Arc<ConnectionManager>,
}

impl RateLimiter {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    /// Count one request for `identifier` and report whether it is over the limit.
    ///
    /// Every call increments; there is no read-only mode. When the store is
    /// not usable the check fails open: `{ limited: false, remaining: limit }`.
    pub async fn check(
        &self,
        identifier: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, RateLimitError> {
        if identifier.is_empty() {
            return Err(RateLimitError::EmptyIdentifier);
        }

        let decision = match self.count(identifier, policy).await {
            Ok(decision) => decision,
            Err(reason) => {
                match &reason {
                    Unavailable::NotReady => tracing::warn!(
                        prefix = %policy.prefix,
                        state = %self.manager.state(),
                        "Rate limit store not ready, allowing request"
                    ),
                    Unavailable::Store(e) => {
                        tracing::warn!(
                            prefix = %policy.prefix,
                            error = %e,
                            "Rate limit check failed, allowing request"
                        );
                        self.manager.report_failure(e);
                    }
                }
                metrics::record_rate_limit_check(&policy.prefix, CheckOutcome::FailOpen);
                return Ok(RateLimitDecision::fail_open(policy));
            }
        };

        let outcome = if decision.limited {
            tracing::info!(
                prefix = %policy.prefix,
                identifier = %identifier,
                "Rate limit exceeded"
            );
            CheckOutcome::Limited
        } else {
            CheckOutcome::Allowed
        };
        metrics::record_rate_limit_check(&policy.prefix, outcome);

        Ok(decision)
    }

    async fn count(&self, identifier: &str, policy: &RateLimitPolicy) -> Result<RateLimitDecision, Unavailable> {
        let conn = self.manager.connection().ok_or(Unavailable::NotReady)?;
        let key = policy.key(identifier);
        let deadline = self.manager.command_timeout();

        let (count, ttl) = with_deadline(deadline, conn.incr_and_ttl(&key))
            .await
            .map_err(Unavailable::Store)?;

        // Attach the window only when this increment opened it (or the key
        // somehow has no expiry); never push an existing expiry forward.
        let reset_after = if count == 1 || ttl < 0 {
            with_deadline(deadline, conn.expire(&key, policy.window))
                .await
                .map_err(Unavailable::Store)?;
            policy.window
        } else {
            Duration::from_secs(ttl as u64)
        };

        let limit = i64::from(policy.limit);
        Ok(RateLimitDecision {
            limited: count > limit,
            remaining: (limit - count).max(0) as u32,
            reset_after: Some(reset_after),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionState, ManagerSettings};
    use crate::store::{MemoryStore, StoreConnector};

    #[test]
    fn test_policy_validation() {
        assert_eq!(RateLimitPolicy::new(0, 60, "p"), Err(PolicyError::ZeroLimit));
        assert_eq!(RateLimitPolicy::new(1, 0, "p"), Err(PolicyError::ZeroWindow));

        let policy = RateLimitPolicy::new(10, 60, "contact_form").unwrap();
        assert_eq!(policy.key("1.2.3.4"), "contact_form:1.2.3.4");
        assert_eq!(policy.window(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_empty_identifier_is_rejected() {
        let manager = ConnectionManager::new(Arc::new(MemoryStore::new()), ManagerSettings::default());
        let limiter = RateLimiter::new(manager);
        let policy = RateLimitPolicy::new(1, 1, "p").unwrap();
        assert_eq!(
            limiter.check("", &policy).await,
            Err(RateLimitError::EmptyIdentifier)
        );
    }

    #[tokio::test]
    async fn test_uninitialized_manager_fails_open() {
        let manager = ConnectionManager::new(Arc::new(MemoryStore::new()), ManagerSettings::default());
        let limiter = RateLimiter::new(manager);
        let policy = RateLimitPolicy::new(3, 60, "p").unwrap();

        for _ in 0..5 {
            let decision = limiter.check("1.2.3.4", &policy).await.unwrap();
            assert!(!decision.limited);
            assert_eq!(decision.remaining, 3);
            assert_eq!(decision.reset_after, None);
        }
    }

    #[tokio::test]
    async fn test_first_hit_sets_window_ttl() {
        let store = MemoryStore::new();
        let manager = ConnectionManager::new(Arc::new(store.clone()), ManagerSettings::default());
        manager.initialize().await.unwrap();
        let limiter = RateLimiter::new(manager.clone());
        let policy = RateLimitPolicy::new(5, 60, "p").unwrap();

        let decision = limiter.check("a", &policy).await.unwrap();
        assert_eq!(decision.remaining, 4);
        assert_eq!(decision.reset_after, Some(Duration::from_secs(60)));

        let ttl = store.key_ttl("p:a").expect("window must carry a ttl");
        assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(58));

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_without_expiry_gets_window() {
        let store = MemoryStore::new();
        let seed = store.connect().await.unwrap();
        assert_eq!(seed.incr_and_ttl("p:a").await.unwrap(), (1, -1));
        assert!(store.key_ttl("p:a").is_none());

        let manager = ConnectionManager::new(Arc::new(store.clone()), ManagerSettings::default());
        manager.initialize().await.unwrap();
        let limiter = RateLimiter::new(manager.clone());
        let policy = RateLimitPolicy::new(5, 60, "p").unwrap();

        let decision = limiter.check("a", &policy).await.unwrap();
        assert_eq!(decision.remaining, 3);
        assert_eq!(decision.reset_after, Some(Duration::from_secs(60)));
        let ttl = store.key_ttl("p:a").expect("orphaned counter must get a ttl");
        assert!(ttl > Duration::from_secs(58) && ttl <= Duration::from_secs(60));

        // Once repaired, later hits leave the expiry alone.
        tokio::time::advance(Duration::from_secs(10)).await;
        let later = limiter.check("a", &policy).await.unwrap();
        assert_eq!(later.remaining, 2);
        assert!(later.reset_after.unwrap() <= Duration::from_secs(50));
        assert!(store.key_ttl("p:a").unwrap() <= Duration::from_secs(50));

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_fails_open_within_deadline() {
        let store = MemoryStore::new();
        let settings = ManagerSettings {
            connect_timeout: Duration::from_millis(500),
            ..ManagerSettings::default()
        };
        let manager = ConnectionManager::new(Arc::new(store.clone()), settings);
        manager.initialize().await.unwrap();
        let limiter = RateLimiter::new(manager.clone());
        let policy = RateLimitPolicy::new(3, 60, "p").unwrap();

        store.stall_counters(true);
        let started = tokio::time::Instant::now();
        let decision = tokio::time::timeout(Duration::from_secs(5), limiter.check("1.2.3.4", &policy))
            .await
            .expect("check must not hang on a stalled store")
            .unwrap();

        assert!(!decision.limited);
        assert_eq!(decision.remaining, 3);
        assert_eq!(decision.reset_after, None);
        assert!(started.elapsed() < Duration::from_secs(1));
        // A timed-out command counts as a lost connection.
        assert_ne!(manager.state(), ConnectionState::Ready);

        manager.shutdown().await;
    }
}
