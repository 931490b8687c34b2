//! Background supervision of the shared connection.
//!
//! # Responsibilities
//! - Probe the connection every keep-alive interval while `Ready`
//! - Run a reconnect episode when a loss is reported
//! - Stop when the manager shuts down
//!
//! # Design Decisions
//! - One task per manager, spawned on first `initialize`
//! - Every sleep races the shutdown signal, so no retry timer outlives `shutdown()`
//! - Reconnect attempts take the initialization lock, so they never overlap
//!   with a caller-driven `initialize`

use std::sync::Arc;

use tokio::time::{self, MissedTickBehavior};

use crate::connection::manager::ConnectionManager;
use crate::connection::state::{ConnectionEvent, ConnectionState, StateTrigger};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::RetryBudget;

/// How a reconnect episode ended.
enum Episode {
    Recovered,
    Exhausted,
    Cancelled,
}

impl ConnectionManager {
    pub(super) async fn supervise(self: Arc<Self>, mut stop: ShutdownSignal) {
        let mut ticker = time::interval(self.settings.keep_alive);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        let mut budget = RetryBudget::from_config(&self.settings.reconnect);

        tracing::debug!(
            keep_alive = ?self.settings.keep_alive,
            "Cache supervisor started"
        );

        loop {
            tokio::select! {
                _ = stop.recv() => break,
                _ = self.lost.notified() => {}
                _ = ticker.tick() => {
                    if self.state().is_ready() && !self.health_check().await {
                        tracing::warn!("Cache keep-alive probe failed");
                    }
                }
            }

            if self.state() == ConnectionState::Reconnecting {
                let episode = self.reconnect(&mut budget, &mut stop).await;
                budget.reset();
                if let Episode::Cancelled = episode {
                    break;
                }
            }
        }

        tracing::debug!("Cache supervisor stopped");
    }

    async fn reconnect(&self, budget: &mut RetryBudget, stop: &mut ShutdownSignal) -> Episode {
        let mut tried = 0u32;

        loop {
            let Some(delay) = budget.record_failure() else {
                self.apply(StateTrigger::RetriesExhausted);
                tracing::error!(
                    attempts = tried,
                    endpoint = %self.connector.endpoint(),
                    "Cache reconnect budget exhausted, giving up"
                );
                let _ = self
                    .events
                    .send(ConnectionEvent::RetriesExhausted { attempts: tried });
                return Episode::Exhausted;
            };

            tokio::select! {
                _ = stop.recv() => return Episode::Cancelled,
                _ = time::sleep(delay) => {}
            }

            let outcome = {
                let _guard = self.init_lock.lock().await;
                if self.state() != ConnectionState::Reconnecting {
                    // Recovered by an explicit initialize, or shut down.
                    return Episode::Recovered;
                }
                tried += 1;
                tracing::info!(attempt = tried, delay = ?delay, "Reconnecting to cache store");
                match self.establish().await {
                    Ok(conn) => Ok(self.install(conn)),
                    Err(e) => Err(e),
                }
            };

            match outcome {
                Ok(_) => {
                    metrics::record_reconnect_attempt(true);
                    tracing::info!(attempts = tried, "Cache connection re-established");
                    return Episode::Recovered;
                }
                Err(e) => {
                    metrics::record_reconnect_attempt(false);
                    tracing::warn!(attempt = tried, error = %e, "Cache reconnect attempt failed");
                    self.emit_error(e.to_string());
                    self.apply(StateTrigger::ConnectFailed);
                }
            }
        }
    }
}
