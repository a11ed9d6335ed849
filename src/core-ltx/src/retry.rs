//! Bounded exponential backoff for transient failures.

use std::future::Future;
use std::num::ParseIntError;
use std::time::Duration;

use data_model_ltx::store::StoreError;

use crate::common::{TimeUnit, poll_interval};

/// Errors that know whether repeating the failed call can help.
pub trait Retriable {
    fn is_retriable(&self) -> bool;
}

impl Retriable for crate::Error {
    fn is_retriable(&self) -> bool {
        crate::Error::is_retriable(self)
    }
}

impl Retriable for StoreError {
    fn is_retriable(&self) -> bool {
        StoreError::is_retriable(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Reads RETRY_MAX_ATTEMPTS and RETRY_BASE_DELAY_MS, falling back to the defaults.
    pub fn from_env() -> Result<Self, ParseIntError> {
        let defaults = Self::default();
        let max_attempts = match std::env::var("RETRY_MAX_ATTEMPTS") {
            Ok(v) => v.trim().parse::<u32>()?.max(1),
            Err(_) => defaults.max_attempts,
        };
        let base_delay = poll_interval(
            TimeUnit::Milliseconds,
            "RETRY_BASE_DELAY_MS",
            defaults.base_delay.as_millis() as u64,
        )?;
        Ok(Self {
            max_attempts,
            base_delay,
            ..defaults
        })
    }

    /// Delay before retrying after the given (1-based) failed attempt: base * 2^(attempt - 1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent).min(self.max_delay)
    }
}

/// Runs `op` until it succeeds, fails with a non-retriable error, or the policy's attempts run out.
pub async fn with_backoff<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retriable + std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retriable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    label,
                    attempt,
                    policy.max_attempts,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
