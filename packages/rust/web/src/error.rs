//! Fetch errors

use outreach_shared::OutreachError;
use thiserror::Error;

/// Errors the fetch capability can report.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL refused before any request was made (scheme, private address).
    #[error("refusing to fetch {0}: non-public or non-HTTP target")]
    Blocked(String),

    /// DNS failure, refused connection, TLS failure.
    #[error("{url}: connection failed: {reason}")]
    Connection { url: String, reason: String },

    /// The per-request fetch timeout elapsed.
    #[error("{0}: request timed out")]
    Timeout(String),

    /// Non-2xx response.
    #[error("{url}: HTTP {status}")]
    Status { url: String, status: u16 },

    /// Body exceeds the configured size cap.
    #[error("{url}: response too large ({bytes} bytes, max {max})")]
    TooLarge { url: String, bytes: u64, max: u64 },

    /// Response is not a document we can read.
    #[error("{url}: unsupported content type '{content_type}'")]
    UnsupportedContent { url: String, content_type: String },

    /// Body could not be read.
    #[error("{url}: failed to read body: {reason}")]
    Body { url: String, reason: String },

    /// HTTP client construction failed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Raised by the redirect policy when a hop targets a non-public address.
#[derive(Debug, Error)]
#[error("redirect to non-public target {0}")]
pub(crate) struct BlockedRedirect(pub(crate) String);

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        let mut source = std::error::Error::source(err);
        while let Some(inner) = source {
            if let Some(blocked) = inner.downcast_ref::<BlockedRedirect>() {
                return Self::Blocked(blocked.0.clone());
            }
            source = inner.source();
        }

        if err.is_timeout() {
            Self::Timeout(url.to_string())
        } else {
            Self::Connection {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

impl From<FetchError> for OutreachError {
    fn from(err: FetchError) -> Self {
        OutreachError::ScrapeFailed(err.to_string())
    }
}
