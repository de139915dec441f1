//! Bounded retry with exponential backoff around the execution driver.
//!
//! Retries are unconditional up to the attempt limit; whether a failure
//! class was worth retrying at all is the caller's decision, made with the
//! classifier before or after the fact.

use crate::error::{FerryError, Result};
use crate::rclone::{Executor, RcloneOptions};
use std::time::Duration;
use tokio::time::sleep;

/// Retry tuning. Zero/invalid fields fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (floor 1).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Cap on the grown delay.
    pub max_delay: Duration,
    /// Growth factor applied after each wait.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Apply defaults to unset or invalid fields.
    pub fn normalized(mut self) -> Self {
        let defaults = RetryConfig::default();
        if self.max_attempts == 0 {
            self.max_attempts = 1;
        }
        if self.initial_delay.is_zero() {
            self.initial_delay = defaults.initial_delay;
        }
        if self.max_delay.is_zero() {
            self.max_delay = defaults.max_delay;
        }
        // NaN-proof: only accept strictly positive multipliers.
        if !(self.multiplier > 0.0) {
            self.multiplier = defaults.multiplier;
        }
        self
    }
}

impl Executor {
    /// Run [`Executor::execute`] up to `cfg.max_attempts` times with
    /// exponential backoff between failures.
    ///
    /// Cancellation is honored at two points: before each attempt, and
    /// while waiting out a backoff delay. Either path returns a
    /// cancellation error wrapping the most recent failure if one exists.
    pub async fn execute_with_retry(
        &self,
        transfer_id: &str,
        opts: &RcloneOptions,
        cfg: RetryConfig,
    ) -> Result<()> {
        let cfg = cfg.normalized();
        let cancel = opts.cancel.clone();
        let mut last_err: Option<FerryError> = None;
        let mut delay = cfg.initial_delay;
        let mut attempt: u32 = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled_error(attempt - 1, last_err));
            }

            let err = match self.execute(transfer_id, opts).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            tracing::warn!(
                id = transfer_id,
                attempt,
                max_attempts = cfg.max_attempts,
                %err,
                "transfer attempt failed"
            );

            if attempt == cfg.max_attempts {
                return Err(FerryError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }
            last_err = Some(err);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return Err(cancelled_error(attempt, last_err));
                }
            }

            delay = delay.mul_f64(cfg.multiplier).min(cfg.max_delay);
            attempt += 1;
        }
    }
}

fn cancelled_error(attempts: u32, last: Option<FerryError>) -> FerryError {
    match last {
        Some(err) => FerryError::CancelledAfter {
            attempts,
            source: Box::new(err),
        },
        None => FerryError::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.initial_delay, Duration::from_secs(2));
        assert_eq!(cfg.max_delay, Duration::from_secs(30));
        assert_eq!(cfg.multiplier, 2.0);
    }

    #[test]
    fn test_normalized_fixes_invalid_fields() {
        let cfg = RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: -1.0,
        }
        .normalized();
        assert_eq!(cfg.max_attempts, 1);
        assert_eq!(cfg.initial_delay, Duration::from_secs(2));
        assert_eq!(cfg.max_delay, Duration::from_secs(30));
        assert_eq!(cfg.multiplier, 2.0);
    }

    #[test]
    fn test_normalized_nan_multiplier() {
        let cfg = RetryConfig {
            multiplier: f64::NAN,
            ..RetryConfig::default()
        }
        .normalized();
        assert_eq!(cfg.multiplier, 2.0);
    }

    #[test]
    fn test_normalized_keeps_valid_fields() {
        let cfg = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            multiplier: 3.0,
        };
        assert_eq!(cfg.normalized(), cfg);
    }

    #[test]
    fn test_cancelled_error_shapes() {
        assert!(matches!(cancelled_error(0, None), FerryError::Cancelled));

        let wrapped = cancelled_error(2, Some(FerryError::Output("boom".into())));
        let text = wrapped.to_string();
        assert!(text.contains("cancelled after 2 attempts"), "got: {text}");
        assert!(text.contains("boom"), "got: {text}");
    }
}
