//! Generation errors

use outreach_shared::OutreachError;
use thiserror::Error;

/// Errors that can occur while generating text.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// API key environment variable is unset or empty.
    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    /// Failed to connect to the generation endpoint
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out
    #[error("generation request timed out")]
    Timeout,

    /// Endpoint answered with a non-success status
    #[error("server error (HTTP {status}): {body}")]
    ServerError { status: u16, body: String },

    /// Response envelope could not be decoded or carried no text
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Model text did not have the shape the stage asked for
    #[error("{task} output malformed: {reason}")]
    Malformed { task: &'static str, reason: String },
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::InvalidResponse(err.to_string())
        }
    }
}

impl From<GenerationError> for OutreachError {
    fn from(err: GenerationError) -> Self {
        OutreachError::Agent(err.to_string())
    }
}
