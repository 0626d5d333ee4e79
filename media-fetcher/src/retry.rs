use crosspost_core::{AcquireConfig, AcquisitionError, ErrorExt};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Backoff unit: the delay after attempt `n` (0-based) is at least `(n + 1)` units
    pub base_delay: Duration,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter_factor: 0.2,
        }
    }
}

impl From<&AcquireConfig> for RetryConfig {
    fn from(config: &AcquireConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            base_delay: config.backoff_unit(),
            jitter_factor: config.jitter_factor,
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry after a backoff delay
    Retry,
    /// Don't retry (for permanent failures)
    NoRetry,
}

/// Determine retry strategy based on error type
pub fn get_retry_strategy(error: &AcquisitionError) -> RetryStrategy {
    if error.is_retryable() {
        RetryStrategy::Retry
    } else {
        RetryStrategy::NoRetry
    }
}

/// Linear backoff with jitter.
///
/// Jitter never reaches a full unit, so consecutive delays strictly increase.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let floor = config.base_delay * (attempt + 1);

    let jitter_range = (floor.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter_cap = (config.base_delay.as_millis() as u64).saturating_sub(1);
    let jitter = fastrand::u64(0..=jitter_range.min(jitter_cap));

    floor + Duration::from_millis(jitter)
}

/// Retry metrics for monitoring
#[derive(Debug, Clone, Default)]
pub struct RetryMetrics {
    pub total_attempts: u64,
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_operations: u64,
    /// Backoff delays slept during the most recent operation
    pub last_delays: Vec<Duration>,
}

/// Retry executor that wraps download attempts with retry logic
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    metrics: Arc<Mutex<RetryMetrics>>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(Mutex::new(RetryMetrics::default())),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic, surfacing the last error once
    /// attempts are exhausted.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, AcquisitionError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, AcquisitionError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut delays = Vec::new();
        let mut attempts = 0u32;
        let mut last_error: Option<AcquisitionError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            attempts += 1;
            let start_time = Instant::now();
            match operation().await {
                Ok(result) => {
                    let mut metrics = self.lock_metrics();
                    metrics.total_attempts += attempts as u64;
                    metrics.last_delays = delays;
                    if attempt > 0 {
                        metrics.total_retries += attempt as u64;
                        metrics.successful_retries += 1;
                        info!(
                            "Operation {} succeeded after {} retries",
                            operation_name, attempt
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    warn!(
                        "Attempt {}/{} failed for {} after {:?}: {}",
                        attempt + 1,
                        max_attempts,
                        operation_name,
                        start_time.elapsed(),
                        error
                    );

                    let should_retry = attempt + 1 < max_attempts;
                    match get_retry_strategy(&error) {
                        RetryStrategy::Retry if should_retry => {
                            let delay = calculate_delay(attempt, &self.config);
                            info!(
                                "Retrying {} in {:?} due to: {}",
                                operation_name, delay, error
                            );
                            delays.push(delay);
                            last_error = Some(error);
                            sleep(delay).await;
                        }
                        RetryStrategy::Retry => {
                            last_error = Some(error);
                            break;
                        }
                        RetryStrategy::NoRetry => {
                            debug!(
                                "Not retrying {} due to error type: {}",
                                operation_name, error
                            );
                            last_error = Some(error);
                            break;
                        }
                    }
                }
            }
        }

        {
            let mut metrics = self.lock_metrics();
            metrics.total_attempts += attempts as u64;
            metrics.total_retries += attempts.saturating_sub(1) as u64;
            metrics.failed_operations += 1;
            metrics.last_delays = delays;
        }

        error!(
            "Operation {} failed after {} attempt(s)",
            operation_name, attempts
        );

        Err(last_error.unwrap_or_else(|| {
            AcquisitionError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no download attempt was made",
            ))
        }))
    }

    /// Get current retry metrics
    pub fn get_metrics(&self) -> RetryMetrics {
        self.lock_metrics().clone()
    }

    pub fn reset_metrics(&self) {
        *self.lock_metrics() = RetryMetrics::default();
    }

    fn lock_metrics(&self) -> std::sync::MutexGuard<'_, RetryMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
