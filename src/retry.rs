//! Retry logic with linear backoff
//!
//! The origin signals overload with a sentinel code inside an otherwise
//! successful response, and network hiccups are common on long transfers.
//! Both are retried with a linear schedule: the wait after attempt `n`
//! (0-based) is `(n + 1) * step`, and there is no wait after the last attempt.
//!
//! # Example
//!
//! ```no_run
//! use bili_dl::retry::{Backoff, IsRetryable, with_retry};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let policy = Backoff::new(5, Duration::from_secs(3));
//! with_retry(&policy, |_attempt| async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Error;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (rate limiting, timeouts, connection reset, 5xx) return `true`.
/// Permanent failures (not found, malformed data, missing tool, user stop) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            // 429 is the HTTP-level cousin of the envelope sentinel
            Error::Http { status, .. } => *status == 429 || (500..600).contains(status),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Malformed(_)
            | Error::NotFound(_)
            | Error::Api { .. }
            | Error::ToolUnavailable(_)
            | Error::ExternalTool { .. }
            | Error::Serialization(_)
            | Error::Stopped
            | Error::NotLoggedIn
            | Error::ShuttingDown
            | Error::Config { .. }
            | Error::Download(_)
            | Error::Other(_) => false,
        }
    }
}

/// Linear backoff schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Backoff step; the wait after attempt `n` is `(n + 1) * step`
    pub step: Duration,
}

impl Backoff {
    /// Create a schedule; `max_attempts` is clamped to at least one attempt
    pub fn new(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            step,
        }
    }

    /// Wait after the given 0-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt.saturating_add(1))
    }

    /// Whether another attempt follows the given 0-based attempt
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

/// Execute an async operation, retrying retryable failures on a linear schedule
///
/// The operation receives the 0-based attempt index, so it can report how many
/// attempts were made when it gives up. Returns the first success, the first
/// non-retryable error, or the error of the final attempt.
pub async fn with_retry<F, Fut, T, E>(policy: &Backoff, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && policy.has_next(attempt) => {
                let delay = policy.delay_for(attempt);

                tracing::warn!(
                    error = %e,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}
