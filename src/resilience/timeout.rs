use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// Extension trait to add timeout functionality to futures
pub trait TimeoutExt<T> {
    /// Fail with [`Error::Timeout`] once `duration` has elapsed
    async fn with_timeout_duration(self, duration: Duration) -> Result<T>;
}

impl<F, T> TimeoutExt<T> for F
where
    F: Future<Output = T>,
{
    async fn with_timeout_duration(self, duration: Duration) -> Result<T> {
        match timeout(duration, self).await {
            Ok(result) => Ok(result),
            Err(_) => Err(Error::Timeout { timeout: duration }),
        }
    }
}

/// Run a fallible operation under a deadline, logging how it ended.
pub async fn with_logged_timeout<Fut, T, E>(
    future: Fut,
    duration: Duration,
    operation_name: &str,
) -> Result<T>
where
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<Error>,
{
    let start_time = Instant::now();
    debug!(
        "Starting operation '{}' with timeout {:?}",
        operation_name, duration
    );

    match future.with_timeout_duration(duration).await {
        Ok(Ok(value)) => {
            debug!(
                "Operation '{}' completed in {:?}",
                operation_name,
                start_time.elapsed()
            );
            Ok(value)
        }
        Ok(Err(error)) => {
            let error = error.into();
            debug!(
                "Operation '{}' failed after {:?}: {}",
                operation_name,
                start_time.elapsed(),
                error
            );
            Err(error)
        }
        Err(error) => {
            warn!("Operation '{}' timed out after {:?}", operation_name, duration);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::providers::ProviderError;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_timeout_ext_success() {
        let result = async { 42 }
            .with_timeout_duration(Duration::from_millis(100))
            .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_ext_timeout() {
        let result = async {
            sleep(Duration::from_millis(200)).await;
            42
        }
        .with_timeout_duration(Duration::from_millis(20))
        .await;

        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_logged_timeout_converts_provider_errors() {
        let result = with_logged_timeout(
            async { Err::<i32, _>(ProviderError::Parse("bad body".to_string())) },
            Duration::from_millis(100),
            "parse",
        )
        .await;
        assert!(matches!(result, Err(Error::Parse { .. })));

        let result = with_logged_timeout(
            async { Ok::<i32, ProviderError>(7) },
            Duration::from_millis(100),
            "ok",
        )
        .await;
        assert_eq!(result.unwrap(), 7);
    }
}
