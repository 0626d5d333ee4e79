use crosspost_core::AppConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RateLimitConfig {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        // Keep the range well-formed even if the caller swapped the bounds
        if max_delay < min_delay {
            Self {
                min_delay: max_delay,
                max_delay: min_delay,
            }
        } else {
            Self {
                min_delay,
                max_delay,
            }
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl From<&AppConfig> for RateLimitConfig {
    fn from(config: &AppConfig) -> Self {
        let (min_delay, max_delay) = config.rate_delay_bounds();
        Self::new(min_delay, max_delay)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PauseStats {
    pub pauses: u32,
    pub total_waited: Duration,
    pub last_delay: Option<Duration>,
}

/// Randomised pause between posts that reached the network.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    stats: Mutex<PauseStats>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(PauseStats::default()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Uniform in `[min_delay, max_delay]`.
    pub fn next_delay(&self) -> Duration {
        let min = self.config.min_delay.as_secs_f64();
        let max = self.config.max_delay.as_secs_f64();
        Duration::from_secs_f64(min + (max - min) * fastrand::f64())
    }

    pub async fn pause(&self) -> Duration {
        let delay = self.next_delay();
        if !delay.is_zero() {
            info!("Sleeping {:.1}s to avoid rate limits", delay.as_secs_f64());
            sleep(delay).await;
        }

        let mut stats = self.stats.lock().await;
        stats.pauses += 1;
        stats.total_waited += delay;
        stats.last_delay = Some(delay);

        delay
    }

    pub async fn stats(&self) -> PauseStats {
        self.stats.lock().await.clone()
    }
}
