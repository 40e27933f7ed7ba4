//! Bounded retry for GPU initialization.

use std::fmt::Display;
use std::time::Duration;
use tracing::{error, warn};

/// How often and how patiently to retry a failing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Run `attempt` until it succeeds or the policy is exhausted.
///
/// `sleep` is called between attempts with the fixed backoff. Returns `None`
/// after logging the final failure.
pub fn retry_with_backoff<T, E, F, S>(
    policy: RetryPolicy,
    what: &str,
    mut attempt: F,
    mut sleep: S,
) -> Option<T>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
    S: FnMut(Duration),
{
    let attempts = policy.max_attempts.max(1);
    for n in 1..=attempts {
        match attempt() {
            Ok(value) => return Some(value),
            Err(err) if n < attempts => {
                warn!("{what} failed (attempt {n}/{attempts}): {err}");
                sleep(policy.backoff);
            }
            Err(err) => {
                error!("{what} failed after {attempts} attempts, giving up: {err}");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let mut sleeps = Vec::new();
        let result: Option<()> = retry_with_backoff(
            RetryPolicy::default(),
            "adapter",
            || {
                calls += 1;
                Err("no adapter")
            },
            |d| sleeps.push(d),
        );
        assert!(result.is_none());
        assert_eq!(calls, 5);
        assert_eq!(sleeps, vec![Duration::from_millis(500); 4]);
    }

    #[test]
    fn test_succeeds_on_later_attempt() {
        let mut calls = 0;
        let mut slept = 0;
        let result = retry_with_backoff(
            RetryPolicy::default(),
            "device",
            || {
                calls += 1;
                if calls < 3 { Err("busy") } else { Ok(calls) }
            },
            |_| slept += 1,
        );
        assert_eq!(result, Some(3));
        assert_eq!(slept, 2);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let mut calls = 0;
        let result: Option<()> = retry_with_backoff(
            RetryPolicy::default().with_max_attempts(0),
            "adapter",
            || {
                calls += 1;
                Err("no adapter")
            },
            |_| {},
        );
        assert!(result.is_none());
        assert_eq!(calls, 1);
    }
}
