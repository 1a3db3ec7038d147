//! Paced, retrying HTTP client for the origin API
//!
//! Every API call goes through [`RateLimitedClient`], which
//! - waits until `request_delay` has passed since the previous request made by
//!   any clone of the client (one shared clock per origin),
//! - decodes the `{code, message, data}` envelope the origin wraps every payload in,
//! - retries the origin's rate-limit sentinel and transient network failures
//!   on the linear schedule from [`crate::retry`].
//!
//! Stream and cover downloads use [`RateLimitedClient::stream_request`] and
//! [`RateLimitedClient::fetch_bytes`], which go to the CDN and are not paced.

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::retry::{Backoff, with_retry};
use crate::session::Session;
use reqwest::header::{COOKIE, RANGE, REFERER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Envelope code meaning "too many requests"
pub const RATE_LIMIT_CODE: i64 = -799;

const CURRENT_USER_PATH: &str = "/x/space/myinfo";

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// HTTP client shared by the resolver and every transfer task
///
/// Cloning is cheap; clones share the connection pool, the pacing clock and
/// the session.
#[derive(Clone, Debug)]
pub struct RateLimitedClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    config: ApiConfig,
    last_request: Arc<tokio::sync::Mutex<Option<Instant>>>,
    session: Arc<RwLock<Session>>,
}

impl RateLimitedClient {
    /// Create a client for the given API configuration with an anonymous session
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {e}")))?;

        // Streams can run far longer than any sane total timeout
        let stream_http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            stream_http,
            config,
            last_request: Arc::new(tokio::sync::Mutex::new(None)),
            session: Arc::new(RwLock::new(Session::anonymous())),
        })
    }

    /// Replace the session attached to every request
    pub fn set_session(&self, session: Session) {
        match self.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    /// Whether the current session was verified as a live login
    pub fn is_logged_in(&self) -> bool {
        self.read_session(|s| s.logged_in())
    }

    /// API configuration this client was built with
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn read_session<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        match self.session.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn cookie_header(&self) -> Option<String> {
        self.read_session(|s| s.cookie_header())
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Block until the shared request delay has elapsed, then claim the slot
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let due = previous + self.config.request_delay;
            let now = Instant::now();
            if due > now {
                tracing::trace!(wait_ms = (due - now).as_millis() as u64, "pacing request");
                tokio::time::sleep_until(due).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn backoff(&self) -> Backoff {
        Backoff::new(self.config.max_retries, self.config.backoff_step)
    }

    /// GET an API endpoint and decode the envelope's `data` as `T`
    ///
    /// # Errors
    /// - [`Error::RateLimited`] when every attempt hit the rate-limit sentinel
    /// - [`Error::Network`] / [`Error::Http`] when transport retries are exhausted
    /// - [`Error::Api`] for any other non-zero envelope code (not retried)
    /// - [`Error::Malformed`] when the body or `data` has an unexpected shape
    pub async fn get_data<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.api_url(path);
        let data = with_retry(&self.backoff(), |attempt| self.fetch_envelope(&url, query, attempt)).await?;

        serde_json::from_value(data).map_err(|e| Error::Malformed(format!("{path}: {e}")))
    }

    async fn fetch_envelope(&self, url: &str, query: &[(&str, String)], attempt: u32) -> Result<serde_json::Value> {
        self.pace().await;

        let mut request = self
            .http
            .get(url)
            .query(query)
            .header(REFERER, &self.config.referer);
        if let Some(cookie) = self.cookie_header() {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        let envelope: Envelope = serde_json::from_slice(&body)
            .map_err(|e| Error::Malformed(format!("invalid response envelope from {url}: {e}")))?;

        match envelope.code {
            0 => Ok(envelope.data),
            RATE_LIMIT_CODE => Err(Error::RateLimited { attempts: attempt + 1 }),
            code => Err(Error::Api {
                code,
                message: envelope.message,
            }),
        }
    }

    /// Check the loaded cookies against the current-user endpoint
    ///
    /// Updates the session's logged-in flag. Returns `false` without a request
    /// when no cookies are loaded.
    pub async fn verify_session(&self) -> Result<bool> {
        if self.cookie_header().is_none() {
            self.set_logged_in(false);
            return Ok(false);
        }

        match self.get_data::<serde_json::Value>(CURRENT_USER_PATH, &[]).await {
            Ok(_) => {
                self.set_logged_in(true);
                tracing::info!("session verified");
                Ok(true)
            }
            Err(Error::Api { code, message }) => {
                tracing::warn!(code, message = %message, "session rejected by origin");
                self.set_logged_in(false);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn set_logged_in(&self, logged_in: bool) {
        match self.session.write() {
            Ok(mut guard) => guard.set_logged_in(logged_in),
            Err(poisoned) => poisoned.into_inner().set_logged_in(logged_in),
        }
    }

    /// Open a stream download, resuming at `offset` when it is non-zero
    ///
    /// Returns the response for `200`, `206` and `416`; the caller decides how
    /// to treat each. Any other status is an [`Error::Http`].
    pub async fn stream_request(&self, url: &str, offset: u64) -> Result<reqwest::Response> {
        let mut request = self.stream_http.get(url).header(REFERER, &self.config.referer);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        if let Some(cookie) = self.cookie_header() {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::RANGE_NOT_SATISFIABLE {
            Ok(response)
        } else {
            Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }

    /// Fetch a small resource (cover image) in one piece
    pub async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let response = self
            .stream_http
            .get(url)
            .header(REFERER, &self.config.referer)
            .timeout(timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
