//! Error types for bili-dl
//!
//! This module provides the error taxonomy for the library:
//! - Client-layer failures (rate limiting, network, malformed envelopes)
//! - Resolver failures (unknown reference, item not found)
//! - Transfer pipeline failures (external tool missing or failing, I/O)
//! - Task control failures (unknown task, invalid state transition)

use std::path::PathBuf;
use thiserror::Error;

use crate::types::TaskId;

/// Result type alias for bili-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bili-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// The origin kept answering with its "too many requests" sentinel
    #[error("rate limited by origin after {attempts} attempt(s)")]
    RateLimited {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Network error (timeout, connection reset, broken body)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status from the origin or a stream host
    #[error("HTTP {status} from {url}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Response body did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Reference or item could not be found
    #[error("not found: {0}")]
    NotFound(String),

    /// Application-level failure reported in the response envelope
    #[error("API error {code}: {message}")]
    Api {
        /// Envelope status code (non-zero)
        code: i64,
        /// Envelope message
        message: String,
    },

    /// The external media tool is not installed or not executable
    #[error("media tool unavailable: {0}")]
    ToolUnavailable(String),

    /// The external media tool exited with a failure status
    #[error("{tool} failed (exit code {code:?}): {stderr}")]
    ExternalTool {
        /// Tool name
        tool: String,
        /// Process exit code, if the process exited normally
        code: Option<i32>,
        /// Trimmed standard error output
        stderr: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transfer stopped by the user
    #[error("stopped by user")]
    Stopped,

    /// An authenticated-only call was made without a valid session
    #[error("no valid session loaded")]
    NotLoggedIn,

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Task lookup or state transition error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Task lookup and lifecycle errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Task not known to the manager
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: TaskId,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID that is in an invalid state for the operation
        id: TaskId,
        /// The operation that was attempted (e.g., "pause", "resume", "retry")
        operation: String,
        /// The current state that prevents the operation (e.g., "completed")
        current_state: String,
    },

    /// Output directory could not be prepared
    #[error("output directory {path} is not usable: {reason}")]
    OutputDir {
        /// Directory path
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },
}

impl Error {
    /// Build an [`Error::ExternalTool`] from process output
    pub(crate) fn external_tool(tool: &str, code: Option<i32>, stderr: &[u8]) -> Self {
        Error::ExternalTool {
            tool: tool.to_string(),
            code,
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }

    /// Whether this error means the remote item does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Http { status: 404, .. })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_message_names_operation_and_state() {
        let err = Error::Download(DownloadError::InvalidState {
            id: TaskId(7),
            operation: "pause".to_string(),
            current_state: "completed".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "download error: cannot pause task 7 in state completed"
        );
    }

    #[test]
    fn stopped_message_is_user_facing() {
        assert_eq!(Error::Stopped.to_string(), "stopped by user");
    }

    #[test]
    fn external_tool_trims_stderr() {
        let err = Error::external_tool("ffmpeg", Some(1), b"  Invalid data found\n\n");
        match err {
            Error::ExternalTool { tool, code, stderr } => {
                assert_eq!(tool, "ffmpeg");
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "Invalid data found");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn not_found_covers_http_404() {
        assert!(Error::NotFound("BV1xx".into()).is_not_found());
        assert!(
            Error::Http {
                status: 404,
                url: "https://example.com".into()
            }
            .is_not_found()
        );
        assert!(
            !Error::Http {
                status: 500,
                url: "https://example.com".into()
            }
            .is_not_found()
        );
    }
}
