//! Release archive retrieval.
//!
//! Provides a trait-based transport so tests can stand in for the network,
//! a `ureq`-backed production transport with a global timeout, and a
//! [`Fetcher`] that layers bounded retry with exponential backoff on top.
//! `file://` URLs bypass the transport and read straight from disk.

use crate::manifest::source_url::{SourceUrl, UrlScheme};
use std::io::Read;
use std::time::Duration;

/// Default network timeout for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest delay between two fetch attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Trait for issuing a single GET request.
///
/// Abstractions allow tests to mock HTTP behaviour without network access.
///
/// # Examples
///
/// ```no_run
/// use milyai_installer::fetch::{HttpTransport, Transport, DEFAULT_TIMEOUT};
///
/// let transport = HttpTransport::new(DEFAULT_TIMEOUT);
/// let bytes = transport.get("https://example.com/milyai.tar.gz")?;
/// # Ok::<(), milyai_installer::fetch::FetchError>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Fetch `url` and return the full response body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] when the request could not complete
    /// and [`FetchError::Http`] when the server answered with a non-success
    /// status.
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Errors arising from fetching a release archive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The resource was unreachable, the request timed out, or the body
    /// could not be read.
    #[error("network error fetching {url}: {reason}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
}

impl FetchError {
    /// Return true for failures worth retrying: network errors, request
    /// timeouts (408), rate limiting (429) and server errors (5xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Http { status, .. } => matches!(status, 408 | 429 | 500..=599),
        }
    }
}

/// HTTP transport using a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Build a transport whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut bytes = Vec::new();
        response
            .into_body()
            .as_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::Network {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(status) => FetchError::Http {
            url: url.to_owned(),
            status: *status,
        },
        other => FetchError::Network {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each later retry.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Return the delay before retry number `retry` (zero-based), capped at
    /// [`MAX_BACKOFF`].
    ///
    /// # Examples
    ///
    /// ```
    /// use milyai_installer::fetch::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(0), Duration::from_millis(500));
    /// assert_eq!(policy.backoff(2), Duration::from_secs(2));
    /// ```
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2_u32.saturating_pow(retry))
            .min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    /// Two retries, starting at 500 ms.
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Retrieves release archives over a [`Transport`] or from local files.
pub struct Fetcher<'a> {
    transport: &'a dyn Transport,
    retry: RetryPolicy,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher over `transport`.
    #[must_use]
    pub fn new(transport: &'a dyn Transport, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Fetch the raw bytes behind `url`.
    ///
    /// Remote URLs are retried on transient failure according to the
    /// retry policy; the last error is returned once attempts run out.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] or [`FetchError::Http`].
    pub fn fetch(&self, url: &SourceUrl) -> Result<Vec<u8>, FetchError> {
        match url.scheme() {
            UrlScheme::File => read_local(url),
            UrlScheme::Http | UrlScheme::Https => self.fetch_remote(url.as_str()),
        }
    }

    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let attempts = self.retry.max_retries.saturating_add(1);
        let mut retry = 0;
        loop {
            match self.transport.get(url) {
                Ok(bytes) => {
                    log::info!("fetched {} byte(s) from {url}", bytes.len());
                    return Ok(bytes);
                }
                Err(err) if err.is_transient() && retry < self.retry.max_retries => {
                    let delay = self.retry.backoff(retry);
                    log::warn!(
                        "fetch attempt {} of {attempts} failed: {err}; retrying in {delay:?}",
                        retry + 1
                    );
                    std::thread::sleep(delay);
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn read_local(url: &SourceUrl) -> Result<Vec<u8>, FetchError> {
    let network = |reason: String| FetchError::Network {
        url: url.to_string(),
        reason,
    };
    let path = url
        .local_path()
        .ok_or_else(|| network("not a file URL".to_owned()))?;
    let bytes = std::fs::read(&path).map_err(|e| network(format!("{path}: {e}")))?;
    log::info!("read {} byte(s) from {path}", bytes.len());
    Ok(bytes)
}
