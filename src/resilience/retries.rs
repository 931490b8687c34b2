//! Retry budget for reconnect episodes.
//!
//! # Responsibilities
//! - Count failed connect attempts within one outage episode
//! - Hand out the delay before the next attempt
//! - Report exhaustion once the maximum retry count is exceeded
//!
//! # Design Decisions
//! - Pure value type: no clocks, no I/O, trivially unit-testable
//! - Reset on successful connect; a new episode starts from zero

use std::time::Duration;

use crate::config::ReconnectConfig;
use crate::resilience::backoff::BackoffStrategy;

/// Attempt counter plus delay policy for one outage episode.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    attempt: u32,
    max_retries: u32,
    step_ms: u64,
    max_delay_ms: u64,
    strategy: BackoffStrategy,
}

impl RetryBudget {
    pub fn new(max_retries: u32, step_ms: u64, max_delay_ms: u64, strategy: BackoffStrategy) -> Self {
        Self {
            attempt: 0,
            max_retries,
            step_ms,
            max_delay_ms,
            strategy,
        }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            config.max_retries,
            config.step_ms,
            config.max_delay_ms,
            config.strategy,
        )
    }

    /// Number of failed attempts recorded in this episode.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Record a failed attempt.
    ///
    /// Returns the delay before the next attempt, or `None` once the budget
    /// is spent and automatic retrying must stop.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        if self.attempt > self.max_retries {
            return None;
        }
        Some(self.strategy.delay(self.attempt, self.step_ms, self.max_delay_ms))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
