//! Exponential backoff around completion calls.
//!
//! Only [`FailureKind::RateLimited`], [`FailureKind::Unavailable`] and
//! [`FailureKind::Overloaded`] are retried. The delay before re-attempt
//! `n` (zero-based index of the failed attempt) is `base * 2^n`, where the
//! base depends on the failure kind: rate limits cool down longer than
//! overloads. The final error is returned unchanged.

use std::future::Future;
use std::time::Duration;

use study_forge_core::cancel::CancelFlag;
use study_forge_core::completion::{CompletionError, FailureKind};

use crate::config::RetryConfig;
use crate::error::{Result, SynthesisError};

/// Upper bound on attempts per call, whatever the configuration says.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    rate_limit_base: Duration,
    overload_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            MAX_ATTEMPTS,
            Duration::from_millis(2000),
            Duration::from_millis(1000),
        )
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, rate_limit_base: Duration, overload_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            rate_limit_base,
            overload_base,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.rate_limit_base(),
            config.overload_base(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep before retrying after the zero-based `attempt` failed.
    pub fn delay_for(&self, kind: FailureKind, attempt: u32) -> Duration {
        let base = match kind {
            FailureKind::RateLimited => self.rate_limit_base,
            FailureKind::Unavailable | FailureKind::Overloaded | FailureKind::Fatal => {
                self.overload_base
            }
        };
        base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run
    /// out. The cancel flag is checked before every attempt.
    pub async fn run<T, F, Fut>(&self, cancel: &CancelFlag, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, CompletionError>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(SynthesisError::Cancelled);
            }
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(e.kind, attempt);
                    tracing::warn!(
                        kind = ?e.kind,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
