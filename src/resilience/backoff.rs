//! Reconnect delay strategies.

use std::time::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the delay between reconnect attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `attempt * step`, clamped to the maximum.
    #[default]
    Linear,
    /// `step * 2^(attempt - 1)`, clamped, plus up to 10% jitter.
    Exponential,
}

impl BackoffStrategy {
    /// Delay to wait before the given (1-based) attempt.
    pub fn delay(self, attempt: u32, step_ms: u64, max_ms: u64) -> Duration {
        match self {
            BackoffStrategy::Linear => linear_backoff(attempt, step_ms, max_ms),
            BackoffStrategy::Exponential => calculate_backoff(attempt, step_ms, max_ms),
        }
    }
}

/// Calculate a linear, clamped backoff delay.
pub fn linear_backoff(attempt: u32, step_ms: u64, max_ms: u64) -> Duration {
    Duration::from_millis(step_ms.saturating_mul(attempt as u64).min(max_ms))
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
