//! HTTP-backed page session
//!
//! Loads documents with a reqwest client. There is no script execution, so a
//! page counts as DOM-ready once its full HTML body has been received; both
//! [`WaitUntil`](super::WaitUntil) signals are satisfied at that point.

use crate::config::UserAgentConfig;
use crate::session::{NavigateOptions, NavigationError, PageSession};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;

/// Builds an HTTP client that presents the configured user agent
///
/// # Example
///
/// ```no_run
/// use parcel_scout::config::UserAgentConfig;
/// use parcel_scout::session::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.value.as_str())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

struct LoadedPage {
    url: String,
    body: String,
}

/// Page session over plain HTTP
pub struct HttpPageSession {
    client: Client,
    page: Option<LoadedPage>,
    closed: bool,
}

impl HttpPageSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page: None,
            closed: false,
        }
    }

    /// URL of the loaded document after redirects
    pub fn current_url(&self) -> Option<&str> {
        self.page.as_ref().map(|page| page.url.as_str())
    }
}

#[async_trait]
impl PageSession for HttpPageSession {
    async fn navigate(
        &mut self,
        url: &str,
        options: &NavigateOptions,
    ) -> Result<(), NavigationError> {
        if self.closed {
            return Err(NavigationError::Closed);
        }
        self.page = None;

        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, options, e))?;

        let status = response.status();

        // Any other status still renders a document, which extraction treats as empty
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(NavigationError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            tracing::debug!("{} responded with HTTP {}", url, status.as_u16());
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| classify_error(url, options, e))?;

        self.page = Some(LoadedPage {
            url: final_url,
            body,
        });

        Ok(())
    }

    fn content(&self) -> Option<&str> {
        self.page.as_ref().map(|page| page.body.as_str())
    }

    async fn close(&mut self) {
        self.page = None;
        self.closed = true;
    }
}

fn classify_error(url: &str, options: &NavigateOptions, error: reqwest::Error) -> NavigationError {
    if error.is_timeout() {
        NavigationError::Timeout {
            url: url.to_string(),
            timeout_ms: options.timeout.as_millis() as u64,
        }
    } else if error.is_connect() {
        NavigationError::Connect {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        NavigationError::Load {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
