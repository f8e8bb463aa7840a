//! Retry policy and sleeping
//!
//! Backoff is strictly doubling with no jitter: with the defaults a URL is
//! tried five times with 2s, 4s, 8s and 16s pauses in between. All waiting
//! goes through a [`Sleeper`] so tests can substitute a recording clock.

use crate::config::CrawlerConfig;
use async_trait::async_trait;
use std::time::Duration;

/// Something that can pause the current task
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer; other tasks keep running meanwhile
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded exponential backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,
    /// Pause after the first failure
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            initial_backoff,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_backoff_ms),
        )
    }

    /// Pause after the given failed attempt (1-based): `initial * 2^(attempt - 1)`
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }

    /// Starts tracking attempts against one target
    pub fn start(&self) -> RetryState {
        RetryState {
            policy: *self,
            attempts: 0,
            backoff: self.initial_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(2000))
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again
    RetryAfter(Duration),
    /// Stop; the error is final
    GiveUp,
}

/// Attempt counter and current backoff for one target
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
    backoff: Duration,
}

impl RetryState {
    /// Records the start of an attempt and returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Decides whether to retry after a failure, doubling the backoff when it does
    pub fn on_failure<E, P>(&mut self, error: &E, is_retryable: P) -> RetryDecision
    where
        P: Fn(&E) -> bool,
    {
        if self.attempts >= self.policy.max_retries || !is_retryable(error) {
            return RetryDecision::GiveUp;
        }

        let wait = self.backoff;
        self.backoff = self.backoff.saturating_mul(2);
        RetryDecision::RetryAfter(wait)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn always(_: &&str) -> bool {
        true
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_backoff, Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        let expected = [2, 4, 8, 16, 32];
        for (i, secs) in expected.iter().enumerate() {
            assert_eq!(
                policy.backoff_after(i as u32 + 1),
                Duration::from_secs(*secs)
            );
        }
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(policy.backoff_after(200), Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_state_follows_backoff_sequence() {
        let policy = RetryPolicy::default();
        let mut state = policy.start();
        let mut waits = Vec::new();

        loop {
            let attempt = state.begin_attempt();
            match state.on_failure(&"boom", always) {
                RetryDecision::RetryAfter(wait) => {
                    assert_eq!(wait, policy.backoff_after(attempt));
                    waits.push(wait);
                }
                RetryDecision::GiveUp => break,
            }
        }

        assert_eq!(state.attempts(), 5);
        assert_eq!(
            waits,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16)
            ]
        );
    }

    #[test]
    fn test_non_retryable_gives_up_immediately() {
        let mut state = RetryPolicy::default().start();
        state.begin_attempt();
        assert_eq!(state.on_failure(&"fatal", |_| false), RetryDecision::GiveUp);
        assert_eq!(state.attempts(), 1);
    }

    #[test]
    fn test_zero_retries_clamped_to_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        let mut state = policy.start();
        state.begin_attempt();
        assert_eq!(state.on_failure(&"boom", always), RetryDecision::GiveUp);
    }
}
