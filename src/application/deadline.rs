//! Request-scoped deadlines.

use std::{future::Future, time::Duration};

use tracing::warn;

use super::error::AppError;

/// Run `operation` under `limit`. When the deadline passes the future is
/// dropped, cancelling any cache or store call still in flight.
pub async fn with_deadline<T, F>(
    operation: &'static str,
    limit: Duration,
    future: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                target = "chorus::deadline",
                operation,
                limit_ms = limit.as_millis() as u64,
                "Operation exceeded its deadline"
            );
            Err(AppError::Timeout { operation, limit })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_operations_time_out() {
        let result: Result<(), AppError> = with_deadline("slow", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(AppError::Timeout {
                operation: "slow",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn fast_operations_pass_through() {
        let value = with_deadline("fast", Duration::from_secs(1), async { Ok(7) })
            .await
            .expect("completes in time");
        assert_eq!(value, 7);
    }
}
