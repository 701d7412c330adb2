//! Reconnection Policy
//!
//! Linear backoff with optional jitter for gateway reconnection. The n-th
//! retry waits `n * base_delay`; after `max_attempts` retries the policy
//! gives up.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::GatewaySettings;

/// Default base delay between reconnection attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(3000);

/// Default number of retries before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay unit; the n-th retry waits `n` units.
    pub base_delay: Duration,
    /// Jitter factor as a fraction (e.g., 0.1 = ±10% randomization).
    pub jitter_factor: f64,
    /// Maximum number of reconnection attempts.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            jitter_factor: 0.0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(base_delay: Duration, jitter_factor: f64, max_attempts: u32) -> Self {
        Self {
            base_delay,
            jitter_factor,
            max_attempts,
        }
    }

    /// Create configuration from `GatewaySettings`.
    #[must_use]
    pub const fn from_gateway_settings(settings: &GatewaySettings) -> Self {
        Self {
            base_delay: settings.reconnect_base_delay,
            jitter_factor: 0.0,
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Reconnection policy implementing linear backoff.
///
/// # Example
///
/// ```rust
/// use market_sync::infrastructure::gateway::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(3000)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(6000)));
///
/// // Simulate successful connection
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Count one more attempt and return how long to wait before it.
    ///
    /// Returns `None` if max attempts have been used up.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt_count >= self.config.max_attempts {
            return None;
        }

        self.attempt_count += 1;

        let delay = self.config.base_delay.saturating_mul(self.attempt_count);
        Some(self.apply_jitter(delay))
    }

    /// Reset the policy after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Check if reconnection should continue.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.attempt_count < self.config.max_attempts
    }

    /// The policy configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Apply jitter to a duration.
    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn no_jitter(base_ms: u64, max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(ReconnectConfig::new(
            Duration::from_millis(base_ms),
            0.0,
            max_attempts,
        ))
    }

    #[test]
    fn default_config_values() {
        let config = ReconnectConfig::default();
        assert_eq!(config.base_delay, Duration::from_millis(3000));
        assert!(config.jitter_factor.abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 5);
    }

    #[test_case(1, 3000 ; "first retry")]
    #[test_case(2, 6000 ; "second retry")]
    #[test_case(5, 15000 ; "last retry")]
    fn policy_linear_backoff(attempt: u32, expected_ms: u64) {
        let mut policy = no_jitter(3000, 5);

        let mut delay = None;
        for _ in 0..attempt {
            delay = policy.next_delay();
        }

        assert_eq!(delay, Some(Duration::from_millis(expected_ms)));
        assert_eq!(policy.attempt_count(), attempt);
    }

    #[test]
    fn policy_max_attempts() {
        let mut policy = no_jitter(100, 3);

        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert_eq!(policy.attempt_count(), 3);

        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
        assert_eq!(policy.attempt_count(), 3);
    }

    #[test]
    fn zero_attempts_never_retries() {
        let mut policy = no_jitter(100, 0);
        assert!(!policy.should_retry());
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn policy_reset() {
        let mut policy = no_jitter(100, 3);

        let _ = policy.next_delay();
        let _ = policy.next_delay();
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert!(policy.should_retry());
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn policy_jitter_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig::new(
                Duration::from_millis(1000),
                0.1,
                5,
            ));

            let millis = policy.next_delay().unwrap().as_millis();

            assert!(millis >= 900, "delay {millis}ms is below minimum 900ms");
            assert!(millis <= 1100, "delay {millis}ms is above maximum 1100ms");
        }
    }
}
