use crate::config::BackoffConfig;
use crate::error::ErrorCategory;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries, also the cap on `Retry-After` hints
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Maximum jitter as percentage of delay
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}

impl From<&BackoffConfig> for RetryConfig {
    fn from(settings: &BackoffConfig) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            multiplier: settings.multiplier,
            jitter: settings.jitter,
        }
    }
}

/// Retry policy that determines retry behavior based on error
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    default_config: RetryConfig,
    rate_limited_config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&BackoffConfig::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_settings(settings: &BackoffConfig) -> Self {
        let default_config = RetryConfig::from(settings);
        let rate_limited_config = RetryConfig {
            initial_delay: default_config.initial_delay * 2,
            max_delay: Duration::from_secs(settings.retry_after_cap_secs)
                .max(default_config.max_delay),
            ..default_config.clone()
        };
        Self {
            default_config,
            rate_limited_config,
        }
    }

    /// Same settings for every retryable error
    #[must_use]
    pub fn uniform(config: RetryConfig) -> Self {
        Self {
            default_config: config.clone(),
            rate_limited_config: config,
        }
    }

    /// Get retry config based on error
    #[must_use]
    pub const fn config_for_error(&self, error: &Error) -> Option<&RetryConfig> {
        match error.category() {
            ErrorCategory::Permanent => None,
            ErrorCategory::RateLimited => Some(&self.rate_limited_config),
            ErrorCategory::Transient => Some(&self.default_config),
        }
    }
}

/// Final result of a retried operation
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    /// Attempts actually started
    pub attempts: u32,
}

/// Execute an operation with retry logic.
///
/// Attempts run strictly one after another. Cancellation is observed while an
/// attempt is in flight and during backoff; once seen, nothing is retried and
/// the outcome is [`Error::Cancelled`].
pub async fn retry_with_policy<T, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
    operation_name: &str,
    cancel: &CancellationToken,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome {
                result: Err(Error::Cancelled),
                attempts: attempt,
            };
        }
        attempt += 1;
        debug!(
            "Executing operation '{}' (attempt {})",
            operation_name, attempt
        );

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = operation() => result,
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        "Operation '{}' succeeded after {} attempts",
                        operation_name, attempt
                    );
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(error) => error,
        };

        let Some(retry_config) = policy.config_for_error(&error) else {
            debug!(
                "Operation '{}' failed with non-retryable error: {}",
                operation_name, error
            );
            return RetryOutcome {
                result: Err(error),
                attempts: attempt,
            };
        };

        if attempt > retry_config.max_retries {
            warn!(
                "Operation '{}' failed after {} attempts: {}",
                operation_name, attempt, error
            );
            return RetryOutcome {
                result: Err(error),
                attempts: attempt,
            };
        }

        let delay = calculate_delay(attempt - 1, retry_config, &error);
        debug!(
            "Operation '{}' failed (attempt {}), retrying after {:?}: {}",
            operation_name, attempt, delay, error
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return RetryOutcome {
                    result: Err(Error::Cancelled),
                    attempts: attempt,
                };
            }
            () = sleep(delay) => {}
        }
    }
}

/// Calculate delay for retry attempt
fn calculate_delay(attempt: u32, config: &RetryConfig, error: &Error) -> Duration {
    // Retry-After wins over our own schedule
    if let Some(retry_after) = error.retry_after() {
        return retry_after.min(config.max_delay);
    }

    let base_delay_ms = config.initial_delay.as_millis() as f64;
    let exponential_delay_ms =
        base_delay_ms * config.multiplier.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    let capped_delay_ms = exponential_delay_ms.min(config.max_delay.as_millis() as f64);
    let delay = Duration::from_millis(capped_delay_ms as u64);

    add_jitter(delay, config.jitter)
}

/// Add jitter to delay
fn add_jitter(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return delay;
    }

    use rand::Rng;
    let mut rng = rand::thread_rng();
    let jitter_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
    let jitter = rng.gen_range(0..=jitter_ms);

    delay + Duration::from_millis(jitter)
}
