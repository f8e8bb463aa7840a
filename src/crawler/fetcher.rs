//! Page fetcher with retry
//!
//! Navigates a page session to a URL, waiting for DOM-ready, and retries
//! failed navigations with exponential backoff. Once the retry budget is
//! spent the URL fails permanently with
//! [`NavigationError::RetriesExhausted`]; callers abandon that target and
//! move on. A cancelled token interrupts both the navigation and the
//! backoff sleep with [`NavigationError::Cancelled`].

use crate::crawler::retry::{RetryDecision, RetryPolicy, Sleeper};
use crate::session::{NavigateOptions, NavigationError, PageSession};
use tokio_util::sync::CancellationToken;

/// A successful navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub url: String,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// Navigates `session` to `url`, retrying per `policy`
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Navigation succeeds | Return immediately |
/// | Retryable failure, budget left | Warn, sleep current backoff, double it |
/// | Retryable failure, budget spent | `RetriesExhausted` |
/// | Non-retryable failure | `RetriesExhausted` after this attempt |
/// | Token cancelled | `Cancelled`, without finishing the navigation or sleep |
pub async fn fetch_with_retry<S>(
    session: &mut S,
    url: &str,
    options: &NavigateOptions,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
) -> Result<FetchOutcome, NavigationError>
where
    S: PageSession + ?Sized,
{
    let cancelled = || NavigationError::Cancelled {
        url: url.to_string(),
    };
    let mut retry = policy.start();

    loop {
        let attempt = retry.begin_attempt();

        let navigated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            result = session.navigate(url, options) => result,
        };

        let error = match navigated {
            Ok(()) => {
                return Ok(FetchOutcome {
                    url: url.to_string(),
                    attempts: attempt,
                })
            }
            Err(e) => e,
        };

        tracing::warn!(
            "Attempt {}/{} failed for {}: {}",
            attempt,
            policy.max_retries,
            url,
            error
        );

        match retry.on_failure(&error, NavigationError::is_retryable) {
            RetryDecision::RetryAfter(wait) => {
                tracing::debug!("Retrying {} in {:?}", url, wait);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    _ = sleeper.sleep(wait) => {}
                }
            }
            RetryDecision::GiveUp => {
                return Err(NavigationError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }
        }
    }
}
