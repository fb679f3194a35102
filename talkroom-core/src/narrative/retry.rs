//! Retry loop for narrative collaborator calls

use crate::config::NarrativeConfig;
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// How many times to call the collaborator and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Wait before the first retry
    pub delay: Duration,
    /// Multiplier applied to the wait after each retry (1 = fixed)
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_millis(1000),
            backoff_factor: 1,
        }
    }
}

impl From<&NarrativeConfig> for RetryPolicy {
    fn from(config: &NarrativeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.retry_delay(),
            backoff_factor: config.backoff_factor,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
            backoff_factor: 1,
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted.
    ///
    /// Every error is treated as transient. On exhaustion the last error is
    /// returned.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;
        let mut delay = self.delay;

        for attempt in 0..attempts {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying {} (attempt {}/{}), waiting {:?}",
                    label,
                    attempt + 1,
                    attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(self.backoff_factor.max(1));
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(
                        section = label,
                        code = e.code(),
                        "Narrative call failed (attempt {}/{})",
                        attempt + 1,
                        attempts
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Narrative(format!("{} retries exhausted", label))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_failure() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::immediate(2);

        let result = policy
            .run("test", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::Narrative("flaky".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_returns_last_error_on_exhaustion() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::immediate(3);

        let result: Result<()> = policy
            .run("test", move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::Narrative(format!("failure {}", n)))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(Error::Narrative(msg)) => assert_eq!(msg, "failure 2"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::immediate(0);

        let _ = policy
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config() {
        let config = NarrativeConfig {
            max_attempts: 4,
            retry_delay_ms: 250,
            backoff_factor: 2,
            ..Default::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay, Duration::from_millis(250));
        assert_eq!(policy.backoff_factor, 2);
        assert_eq!(RetryPolicy::default(), RetryPolicy::from(&NarrativeConfig::default()));
    }
}
