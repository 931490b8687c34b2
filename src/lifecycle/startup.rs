//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the shared connection manager and rate limiter from config
//! - Run the first `initialize()` and decide whether a failure is fatal
//!
//! # Design Decisions
//! - A failed first connect aborts startup only when `cache.require_on_startup`
//!   is set; otherwise the service starts degraded (limiter fails open) and
//!   the manager keeps retrying in the background

use std::sync::Arc;

use crate::config::AppConfig;
use crate::connection::{ConnectionManager, InitializationError};
use crate::security::{PolicyError, RateLimitPolicy, RateLimiter};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid cache configuration: {0}")]
    Store(#[from] StoreError),

    #[error("cache unavailable at startup: {0}")]
    Initialization(#[from] InitializationError),

    #[error("invalid contact form policy: {0}")]
    Policy(#[from] PolicyError),
}

/// Everything the HTTP layer and the signal hook need.
#[derive(Clone)]
pub struct Services {
    pub manager: Arc<ConnectionManager>,
    pub limiter: RateLimiter,
    pub contact_policy: RateLimitPolicy,
}

/// Build services from config and connect to the store.
pub async fn bootstrap(config: &AppConfig) -> Result<Services, StartupError> {
    let manager = ConnectionManager::from_config(&config.cache)?;
    bootstrap_with(config, manager).await
}

/// Same as [`bootstrap`] with an already-built manager.
pub async fn bootstrap_with(
    config: &AppConfig,
    manager: Arc<ConnectionManager>,
) -> Result<Services, StartupError> {
    let contact_policy = RateLimitPolicy::from_config(&config.contact_form)?;

    match manager.initialize().await {
        Ok(()) => tracing::info!(endpoint = %manager.endpoint(), "Cache connection ready"),
        Err(e) if config.cache.require_on_startup => {
            manager.shutdown().await;
            return Err(e.into());
        }
        Err(e) => tracing::warn!(
            error = %e,
            "Starting without cache; rate limiting fails open until it recovers"
        ),
    }

    Ok(Services {
        limiter: RateLimiter::new(manager.clone()),
        manager,
        contact_policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use crate::connection::{ConnectionState, ManagerSettings};
    use crate::store::MemoryStore;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.cache.backend = StoreBackend::Memory;
        config
    }

    #[tokio::test]
    async fn test_bootstrap_memory_backend() {
        let services = bootstrap(&memory_config()).await.unwrap();
        assert_eq!(services.manager.state(), ConnectionState::Ready);
        assert_eq!(services.contact_policy.prefix(), "contact_form");
        services.manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_required_cache_aborts_startup() {
        let store = MemoryStore::new();
        store.refuse_connections(true);
        let manager = ConnectionManager::new(Arc::new(store), ManagerSettings::default());

        let mut config = memory_config();
        config.cache.require_on_startup = true;
        let err = bootstrap_with(&config, manager.clone()).await.err().unwrap();
        assert!(matches!(err, StartupError::Initialization(_)));
        assert_eq!(manager.state(), ConnectionState::Ended);
    }

    #[tokio::test]
    async fn test_optional_cache_starts_degraded() {
        let store = MemoryStore::new();
        store.refuse_connections(true);
        let manager = ConnectionManager::new(Arc::new(store), ManagerSettings::default());

        let services = bootstrap_with(&memory_config(), manager).await.unwrap();
        assert_ne!(services.manager.state(), ConnectionState::Ready);
        services.manager.shutdown().await;
    }
}
