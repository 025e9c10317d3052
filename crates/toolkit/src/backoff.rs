//! Exponential backoff between remote call attempts.

use std::time::Duration;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`BackoffConfig::max_delay`].
pub fn next_delay(current: Duration, config: &BackoffConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Delay to wait after failed attempt number `attempt` (1-based):
/// `initial`, `initial * m`, `initial * m^2`, ...
pub fn delay_after_attempt(attempt: u32, config: &BackoffConfig) -> Duration {
    let mut delay = config.initial_delay.min(config.max_delay);
    for _ in 1..attempt {
        delay = next_delay(delay, config);
    }
    delay
}
