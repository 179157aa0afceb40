//! Retry policy for transient fetch failures

use crate::config::FetchConfig;
use std::time::Duration;

/// How often and how patiently a fetch is retried
///
/// The policy is a plain value: it decides whether another attempt is
/// allowed and how long to wait before it, but never sleeps itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub backoff_base: Duration,

    /// Upper bound for any single delay
    pub max_backoff: Duration,

    /// Status codes worth another attempt
    pub retry_statuses: Vec<u16>,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base: Duration::ZERO,
            max_backoff: Duration::ZERO,
            retry_statuses: Vec::new(),
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Whether a retry may follow after `retries_done` retries
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Delay before retry number `retries_done + 1`
    ///
    /// `min(base * 2^retries_done, max_backoff)`
    pub fn delay_for(&self, retries_done: u32) -> Duration {
        let factor = 2u32.saturating_pow(retries_done);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            retry_statuses: config.retry_statuses.clone(),
        }
    }
}
