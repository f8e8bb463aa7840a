//! Page session capability
//!
//! A page session navigates to a URL, holds the loaded document, and lets
//! callers evaluate extraction functions against it. The crawler only ever
//! talks to this trait, so extraction logic stays free of navigation
//! concerns and tests can drive the crawler with scripted pages.

mod http;
#[cfg(test)]
pub(crate) mod scripted;

pub use http::{build_http_client, HttpPageSession};

use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;
use thiserror::Error;

/// Which load signal a navigation waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// The document has been parsed; subresources may still be loading
    #[default]
    DomContentLoaded,
    /// Every subresource has finished loading
    Load,
}

/// Options for a single navigation
#[derive(Debug, Clone)]
pub struct NavigateOptions {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
}

impl NavigateOptions {
    pub fn dom_ready(timeout: Duration) -> Self {
        Self {
            wait_until: WaitUntil::DomContentLoaded,
            timeout,
        }
    }
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self::dom_ready(Duration::from_secs(60))
    }
}

/// Page-load failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Navigation to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to load {url}: {message}")]
    Load { url: String, message: String },

    #[error("Page session is closed")]
    Closed,

    #[error("Navigation to {url} cancelled")]
    Cancelled { url: String },

    #[error("Failed to navigate to {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: Box<NavigationError>,
    },
}

impl NavigationError {
    /// Whether another attempt at the same URL could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Closed | Self::Cancelled { .. } | Self::RetriesExhausted { .. }
        )
    }
}

/// A browser-like page the crawler can navigate and evaluate against
#[async_trait]
pub trait PageSession: Send {
    /// Navigates to `url`, replacing the current document on success
    ///
    /// A failed navigation leaves no document loaded.
    async fn navigate(&mut self, url: &str, options: &NavigateOptions)
        -> Result<(), NavigationError>;

    /// Source of the currently loaded document, if any
    fn content(&self) -> Option<&str>;

    /// Releases the session; further navigations fail with [`NavigationError::Closed`]
    async fn close(&mut self);

    /// Runs `f` against the loaded document
    ///
    /// With nothing loaded, `f` sees an empty document.
    fn evaluate_in_page<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Html) -> T,
        Self: Sized,
    {
        let document = Html::parse_document(self.content().unwrap_or_default());
        f(&document)
    }
}
