//! Error types for the outreach pipeline.
//!
//! Library crates use [`OutreachError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics, and renders
//! pipeline failures as an [`ErrorResponse`] body.

use std::path::PathBuf;

use serde::Serialize;

/// Top-level error type for all outreach operations.
#[derive(Debug, thiserror::Error)]
pub enum OutreachError {
    /// One or more required request fields are absent.
    #[error("missing required field(s): {}", fields.join(", "))]
    MissingField { fields: Vec<String> },

    /// The request (or a stage's output) violates its structural contract.
    #[error("validation error: {}", details.join("; "))]
    Validation { details: Vec<String> },

    /// The research fetch failed or yielded unusable content.
    #[error("scrape failed: {0}")]
    ScrapeFailed(String),

    /// Copy or QA generation failed, or produced non-conforming output.
    #[error("agent error: {0}")]
    Agent(String),

    /// The global pipeline deadline elapsed.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Invariant broken inside the pipeline itself.
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OutreachError>;

impl OutreachError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a single-detail validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            details: vec![msg.into()],
        }
    }

    /// Create an agent error from any displayable message.
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::ScrapeFailed(_) => ErrorKind::ScrapeFailed,
            Self::Agent(_) => ErrorKind::AgentError,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Internal(_) | Self::Config { .. } | Self::Io { .. } => {
                ErrorKind::InternalError
            }
        }
    }

    /// Render this error as the response body returned to callers.
    pub fn to_response(&self) -> ErrorResponse {
        let kind = self.kind();
        let (message, details, field) = match self {
            Self::MissingField { fields } => (
                "request is missing required fields".to_string(),
                fields.clone(),
                fields.first().cloned(),
            ),
            Self::Validation { details } => {
                ("request failed validation".to_string(), details.clone(), None)
            }
            Self::ScrapeFailed(msg)
            | Self::Agent(msg)
            | Self::Timeout(msg) => (msg.clone(), Vec::new(), None),
            other => (other.to_string(), Vec::new(), None),
        };

        ErrorResponse {
            error: kind,
            message,
            details,
            field,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Caller-visible error kinds, each with a fixed status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    MissingField,
    ScrapeFailed,
    AgentError,
    Timeout,
    InternalError,
}

impl ErrorKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::MissingField => "missing_field",
            Self::ScrapeFailed => "scrape_failed",
            Self::AgentError => "agent_error",
            Self::Timeout => "timeout",
            Self::InternalError => "internal_error",
        }
    }

    /// HTTP-style status code for the kind.
    pub fn status(&self) -> u16 {
        match self {
            Self::ValidationError => 400,
            Self::MissingField => 422,
            Self::ScrapeFailed => 502,
            Self::AgentError | Self::InternalError => 500,
            Self::Timeout => 504,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error body returned for a failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
