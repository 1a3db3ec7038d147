//! Transfer task: one item, one output file.
//!
//! Split into focused submodules:
//! - [`control`] - Lifecycle transitions (start, pause, resume, stop)
//! - [`orchestration`] - Execution algorithm (tool check, streams, mux, cover)
//! - [`fetch`] - Resumable chunked stream download
//! - [`progress`] - Windowed speed / ETA tracking

mod control;
mod fetch;
mod orchestration;
mod progress;


use crate::client::RateLimitedClient;
use crate::config::DownloadConfig;
use crate::media::MediaProcessor;
use crate::resolver::MediaSourceResolver;
use crate::types::{Event, ItemDescriptor, TaskId, TaskOptions, TaskSnapshot, TaskStatus};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use super::lock;

/// Receives a task's progress and its single terminal notification
///
/// Callbacks run on the task's worker. Implementations must not block.
pub trait TaskObserver: Send + Sync {
    /// Progress changed (at most once per progress interval)
    fn on_progress(&self, _task: &TransferTask) {}

    /// Task reached `completed` or `skipped`
    fn on_complete(&self, task: &TransferTask);

    /// Task reached `error` (including a user stop)
    fn on_error(&self, task: &TransferTask, error: &str);
}

/// Everything a running task needs from its environment
#[derive(Clone)]
pub struct TaskContext {
    pub(crate) client: RateLimitedClient,
    pub(crate) resolver: MediaSourceResolver,
    pub(crate) processor: Arc<dyn MediaProcessor>,
    pub(crate) download: Arc<DownloadConfig>,
    pub(crate) backoff_step: std::time::Duration,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl TaskContext {
    /// Build a context from its parts
    pub fn new(
        resolver: MediaSourceResolver,
        processor: Arc<dyn MediaProcessor>,
        download: DownloadConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        let client = resolver.client().clone();
        let backoff_step = client.config().backoff_step;
        Self {
            client,
            resolver,
            processor,
            download: Arc::new(download),
            backoff_step,
            event_tx,
        }
    }

    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Mutable task fields, guarded by one lock
#[derive(Debug, Clone)]
pub(crate) struct TaskState {
    pub status: TaskStatus,
    pub progress: f32,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub speed_bps: u64,
    pub eta_secs: u64,
    pub error: Option<String>,
    pub output: Option<PathBuf>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskState {
    fn new() -> Self {
        Self {
            status: TaskStatus::Pending,
            progress: 0.0,
            downloaded_bytes: 0,
            total_bytes: 0,
            speed_bps: 0,
            eta_secs: 0,
            error: None,
            output: None,
            finished_at: None,
        }
    }
}

/// Running worker; every stop caller awaits the same exit
#[derive(Clone)]
pub(crate) struct Worker {
    pub exit: Shared<BoxFuture<'static, ()>>,
    pub abort: AbortHandle,
}

impl Worker {
    fn spawn(run: impl Future<Output = ()> + Send + 'static) -> Self {
        let handle = tokio::spawn(run);
        Self {
            abort: handle.abort_handle(),
            exit: handle.map(|_| ()).boxed().shared(),
        }
    }
}

/// Cancellation and worker bookkeeping
pub(crate) struct TaskControl {
    /// Replaced on every start so a retried task never sees an old stop
    pub cancel: Mutex<CancellationToken>,
    pub pause_tx: watch::Sender<bool>,
    pub worker: Mutex<Option<Worker>>,
    /// Set by whoever delivers the terminal notification first
    pub finished: AtomicBool,
    /// Scheduler completion hook already registered
    pub hooked: AtomicBool,
    pub events: Mutex<Option<broadcast::Sender<Event>>>,
}

struct TaskInner {
    id: TaskId,
    item: ItemDescriptor,
    options: Mutex<TaskOptions>,
    state: Mutex<TaskState>,
    control: TaskControl,
    observers: Mutex<Vec<Arc<dyn TaskObserver>>>,
    created_at: DateTime<Utc>,
}

/// Handle to one transfer task (cloning shares the task)
#[derive(Clone)]
pub struct TransferTask {
    inner: Arc<TaskInner>,
}

impl std::fmt::Debug for TransferTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferTask")
            .field("id", &self.inner.id)
            .field("title", &self.inner.item.title)
            .field("status", &self.status())
            .finish()
    }
}

impl TransferTask {
    /// Create a pending task for `item`
    pub fn new(id: TaskId, item: ItemDescriptor, options: TaskOptions) -> Self {
        let (pause_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(TaskInner {
                id,
                item,
                options: Mutex::new(options),
                state: Mutex::new(TaskState::new()),
                control: TaskControl {
                    cancel: Mutex::new(CancellationToken::new()),
                    pause_tx,
                    worker: Mutex::new(None),
                    finished: AtomicBool::new(false),
                    hooked: AtomicBool::new(false),
                    events: Mutex::new(None),
                },
                observers: Mutex::new(Vec::new()),
                created_at: Utc::now(),
            }),
        }
    }

    /// Task ID
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Item this task downloads
    pub fn item(&self) -> &ItemDescriptor {
        &self.inner.item
    }

    /// Current options
    pub fn options(&self) -> TaskOptions {
        lock(&self.inner.options).clone()
    }

    /// Current lifecycle status
    pub fn status(&self) -> TaskStatus {
        lock(&self.inner.state).status
    }

    /// Last error message
    pub fn error(&self) -> Option<String> {
        lock(&self.inner.state).error.clone()
    }

    /// Final output path once completed or skipped
    pub fn output_path(&self) -> Option<PathBuf> {
        lock(&self.inner.state).output.clone()
    }

    /// Owned point-in-time view
    pub fn snapshot(&self) -> TaskSnapshot {
        let state = lock(&self.inner.state);
        TaskSnapshot {
            id: self.inner.id,
            title: self.inner.item.title.clone(),
            status: state.status,
            progress: state.progress,
            downloaded_bytes: state.downloaded_bytes,
            total_bytes: state.total_bytes,
            speed_bps: state.speed_bps,
            eta_secs: state.eta_secs,
            error: state.error.clone(),
            created_at: self.inner.created_at,
            finished_at: state.finished_at,
        }
    }

    /// Register an observer; observers accumulate and are never replaced
    pub fn add_observer(&self, observer: Arc<dyn TaskObserver>) {
        lock(&self.inner.observers).push(observer);
    }

    fn observers(&self) -> Vec<Arc<dyn TaskObserver>> {
        lock(&self.inner.observers).clone()
    }

    pub(crate) fn update_state<R>(&self, f: impl FnOnce(&mut TaskState) -> R) -> R {
        f(&mut lock(&self.inner.state))
    }

    pub(crate) fn control(&self) -> &TaskControl {
        &self.inner.control
    }

    pub(crate) fn set_options(&self, f: impl FnOnce(&mut TaskOptions)) {
        f(&mut lock(&self.inner.options));
    }

    /// Broadcast lifecycle events for this task on `tx`
    pub(crate) fn attach_events(&self, tx: broadcast::Sender<Event>) {
        *lock(&self.inner.control.events) = Some(tx);
    }

    pub(crate) fn emit(&self, event: Event) {
        if let Some(tx) = lock(&self.inner.control.events).as_ref() {
            tx.send(event).ok();
        }
    }

    /// Register `observer` unless a hook was already registered
    pub(crate) fn attach_hook_once(&self, observer: Arc<dyn TaskObserver>) {
        if !self.inner.control.hooked.swap(true, Ordering::SeqCst) {
            self.add_observer(observer);
        }
    }

    fn notify_progress(&self) {
        for observer in self.observers() {
            observer.on_progress(self);
        }
    }
}

/// How a task reached its terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Terminal {
    Completed(PathBuf),
    Skipped(PathBuf),
    Failed(String),
    Stopped,
}
