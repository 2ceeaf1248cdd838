use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    pub fn run<T>(&self, label: &str, operation: impl FnMut() -> Result<T>) -> Result<Attempted<T>> {
        self.run_with_sleep(label, operation, thread::sleep)
    }

    pub fn run_with_sleep<T>(
        &self,
        label: &str,
        mut operation: impl FnMut() -> Result<T>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<Attempted<T>> {
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            let err = match operation() {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(err) => err,
            };
            if !err.is_retryable() || self.exhausted(attempt) {
                return Err(err);
            }
            warn!(
                label,
                attempt,
                delay_secs = self.delay.as_secs(),
                error = %err,
                "attempt failed; retrying"
            );
            sleep(self.delay);
        }
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}
