//! Automatic retry with exponential backoff and jitter.
//!
//! Retries transient gateway failures (429, 5xx, network timeouts) with
//! configurable exponential backoff. Permanent failures (bad request, auth)
//! and anything content-shaped (empty output, unparseable JSON) fail
//! immediately — re-asking the model the identical question is the engines'
//! fallback policy's job, not the transport's.

use std::time::Duration;

use super::GatewayError;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = no retries, just fail immediately).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries. Uses sensible defaults.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic jitter keyed on attempt number — not worth
            // pulling in rand just for this.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                3 => 0.85,
                _ => 0.80,
            };
            Duration::from_secs_f64(capped * jitter_factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

/// Whether a gateway error is transient and worth retrying.
pub fn is_transient(error: &GatewayError) -> bool {
    match error {
        GatewayError::Timeout => true,
        GatewayError::Http(msg) => {
            let transient_statuses = ["429", "500", "502", "503", "504"];
            if transient_statuses
                .iter()
                .any(|s| msg.contains(&format!("HTTP {s}")))
            {
                return true;
            }
            let lower = msg.to_lowercase();
            [
                "request failed:",
                "connection reset",
                "connection refused",
                "timed out",
                "timeout",
                "broken pipe",
                "network",
            ]
            .iter()
            .any(|p| lower.contains(p))
        }
        // Provider-reported errors, empty output, and unparseable content
        // are not transport problems. Retrying is unlikely to help.
        GatewayError::Api(_) | GatewayError::Empty | GatewayError::Parse(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_no_retries() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn with_retries_sets_count() {
        let config = RetryConfig::with_retries(3);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn delay_increases_exponentially() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::with_retries(5)
        };
        let d0 = config.delay_for_attempt(0);
        let d1 = config.delay_for_attempt(1);
        let d2 = config.delay_for_attempt(2);

        assert!(d1 > d0, "d1={d1:?} should be > d0={d0:?}");
        assert!(d2 > d1, "d2={d2:?} should be > d1={d1:?}");
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig {
            jitter: false,
            max_delay: Duration::from_secs(2),
            ..RetryConfig::with_retries(10)
        };
        let d10 = config.delay_for_attempt(10);
        assert!(d10 <= Duration::from_secs(2));
    }

    #[test]
    fn jitter_reduces_delay() {
        let with = RetryConfig {
            jitter: true,
            ..RetryConfig::with_retries(3)
        };
        let without = RetryConfig {
            jitter: false,
            ..RetryConfig::with_retries(3)
        };
        assert!(with.delay_for_attempt(2) <= without.delay_for_attempt(2));
    }

    #[test]
    fn transient_errors_detected() {
        assert!(is_transient(&GatewayError::Timeout));
        assert!(is_transient(&GatewayError::Http(
            "OpenRouter API HTTP 429: rate limited".into()
        )));
        assert!(is_transient(&GatewayError::Http(
            "request failed: connection reset".into()
        )));
    }

    #[test]
    fn permanent_and_content_errors_not_retried() {
        assert!(!is_transient(&GatewayError::Http(
            "OpenRouter API HTTP 400: bad request".into()
        )));
        assert!(!is_transient(&GatewayError::Api("overloaded".into())));
        assert!(!is_transient(&GatewayError::Empty));
        assert!(!is_transient(&GatewayError::Parse("nope".into())));
    }
}
