//! Timeout enforcement for store round trips.
//!
//! Every network exchange with the store carries a deadline; an elapsed
//! deadline is reported as [`StoreError::Timeout`], distinct from a refused
//! or failed command.

use std::future::Future;
use std::time::Duration;

use tokio::time;

use crate::store::StoreError;

/// Run a store operation under a deadline.
pub async fn with_deadline<T, F>(deadline: Duration, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match time::timeout(deadline, op).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stalled_operation_times_out() {
        let result: Result<(), StoreError> = with_deadline(Duration::from_millis(50), async {
            time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<(), StoreError> = with_deadline(Duration::from_secs(1), async {
            Err(StoreError::Closed)
        })
        .await;
        assert!(matches!(result, Err(StoreError::Closed)));
    }
}
