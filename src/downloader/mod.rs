//! Task scheduling and transfer orchestration.
//!
//! The `DownloadManager` struct and its methods are organized by domain:
//! - [`queue`] - FIFO admission under the concurrency cap
//! - [`control`] - Task control (pause/resume/stop/retry) and queries
//! - [`ingest`] - Turning resolve results into tasks
//! - [`lifecycle`] - Shutdown coordination
//! - [`reporter`] - Logging event consumer
//! - [`task`] - One transfer: state machine, fetch, merge

mod control;
mod ingest;
mod lifecycle;
mod queue;
mod reporter;
pub mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use reporter::spawn_event_reporter;
pub use task::{TaskContext, TaskObserver, TransferTask};

use crate::client::RateLimitedClient;
use crate::config::Config;
use crate::error::Result;
use crate::media::{self, MediaProcessor};
use crate::resolver::MediaSourceResolver;
use crate::session::Session;
use crate::types::{Event, TaskId, TaskOptions};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Collections owned by the scheduler
///
/// A task id lives in exactly one of `pending`, `active`, `completed` or
/// `failed`; `tasks` holds every task ever enqueued.
#[derive(Default)]
pub(crate) struct SchedulerState {
    pub(crate) pending: VecDeque<TaskId>,
    pub(crate) active: Vec<TaskId>,
    pub(crate) completed: Vec<TaskId>,
    pub(crate) failed: Vec<TaskId>,
    pub(crate) tasks: HashMap<TaskId, TransferTask>,
}

/// Bounded FIFO scheduler
///
/// Admission and completion bookkeeping run under one `std::sync::Mutex`
/// that is never held across an `.await`, so two admission passes can never
/// interleave and overshoot `max_concurrency`.
pub(crate) struct Scheduler {
    pub(crate) state: Mutex<SchedulerState>,
    pub(crate) ctx: TaskContext,
    pub(crate) max_concurrency: usize,
    pub(crate) accepting_new: AtomicBool,
    pub(crate) next_id: AtomicU64,
}

/// Download manager (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct DownloadManager {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Resolver sharing the manager's paced client
    pub(crate) resolver: MediaSourceResolver,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) scheduler: Arc<Scheduler>,
}

impl DownloadManager {
    /// Create a manager from configuration
    ///
    /// Builds the paced client, loads the cookie file when one is configured
    /// and locates the media tool. A missing tool is not an error here: every
    /// task fails with `ToolUnavailable` instead.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = RateLimitedClient::new(config.api.clone())?;

        if let Some(path) = &config.session.cookie_file {
            let session = Session::load(path).await;
            tracing::info!(path = %path.display(), has_cookies = session.has_cookies(), "session loaded");
            client.set_session(session);
        }

        let processor = media::detect(&config.tools);
        tracing::info!(processor = processor.name(), "media processor selected");

        Ok(Self::with_components(config, client, processor))
    }

    /// Create a manager from pre-built parts
    pub fn with_components(config: Config, client: RateLimitedClient, processor: Arc<dyn MediaProcessor>) -> Self {
        // Buffer of 1000 events per subscriber before it lags
        let (event_tx, _rx) = broadcast::channel(1000);
        let resolver = MediaSourceResolver::new(client);
        let ctx = TaskContext::new(resolver.clone(), processor, config.download.clone(), event_tx.clone());

        let scheduler = Scheduler {
            state: Mutex::new(SchedulerState::default()),
            ctx,
            max_concurrency: config.download.max_concurrent_downloads.max(1),
            accepting_new: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        };

        Self {
            config: Arc::new(config),
            resolver,
            event_tx,
            scheduler: Arc::new(scheduler),
        }
    }

    /// Subscribe to task events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives
    /// `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bili_dl::{Config, DownloadManager};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let manager = DownloadManager::new(Config::default()).await?;
    ///
    ///     let mut events = manager.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             println!("{event:?}");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the configuration the manager was built with
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Options targeting the configured download directory
    ///
    /// Every other field is unset and picks up its configured default once queued.
    pub fn default_options(&self) -> TaskOptions {
        TaskOptions::new(self.config.download.download_dir.clone())
    }

    /// Resolver bound to the manager's client
    pub fn resolver(&self) -> &MediaSourceResolver {
        &self.resolver
    }

    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
