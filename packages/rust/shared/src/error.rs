//! Error types for Jackline.
//!
//! Library crates use [`JacklineError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all Jackline operations.
#[derive(Debug, thiserror::Error)]
pub enum JacklineError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Connection, DNS, or body-read failure talking to Jenkins.
    #[error("{method} {url}: transport error: {message}")]
    Transport {
        method: String,
        url: String,
        message: String,
    },

    /// Jenkins answered with a status code the operation cannot accept.
    #[error("{method} {url}: HTTP {status}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Malformed JSON payload or header value.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A build never became reachable.
    #[error("timed out after {}s waiting for build at {url}", elapsed.as_secs())]
    Timeout { url: String, elapsed: Duration },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Caller supplied input that cannot be used (e.g. a file name with no stem).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, JacklineError>;

impl JacklineError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a transport-level failure with the request it belonged to.
    pub fn transport(method: &str, url: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            method: method.to_string(),
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// An unexpected HTTP status, keeping the response body for diagnostics.
    pub fn status(method: &str, url: &str, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            method: method.to_string(),
            url: url.to_string(),
            status,
            body: body.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
