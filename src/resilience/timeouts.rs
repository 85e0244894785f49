//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every storage call made while serving a request
//! - Cancel operations cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other storage errors
//! - A timed-out call surfaces as a server error, never a hang

use std::future::Future;
use std::time::Duration;

use crate::store::{StoreError, StoreResult};

/// Run one storage call under `deadline`.
pub async fn with_deadline<F, T>(deadline: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Storage call exceeded deadline");
            Err(StoreError::Timeout(deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let value = with_deadline(Duration::from_millis(50), async { Ok::<_, StoreError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_inner_error_is_preserved() {
        let err = with_deadline(Duration::from_millis(50), async {
            Err::<(), _>(StoreError::Backend("disk on fire".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let err = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err, StoreError::Timeout(Duration::from_millis(10)));
    }
}
