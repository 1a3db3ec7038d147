//! Lifecycle transitions: start, pause, resume, stop, reset

use super::fetch::Signals;
use super::{TaskContext, Terminal, TransferTask, Worker};
use crate::downloader::lock;
use crate::error::{DownloadError, Error, Result};
use crate::types::{Event, TaskStatus};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

impl TransferTask {
    fn invalid_state(&self, operation: &str, current: TaskStatus) -> Error {
        Error::Download(DownloadError::InvalidState {
            id: self.id(),
            operation: operation.to_string(),
            current_state: current.to_string(),
        })
    }

    /// Move `from` to `to` atomically, or report the current state
    fn transition(&self, operation: &str, from: TaskStatus, to: TaskStatus) -> Result<()> {
        self.update_state(|state| {
            if state.status == from {
                state.status = to;
                Ok(())
            } else {
                Err(state.status)
            }
        })
        .map_err(|current| self.invalid_state(operation, current))
    }

    /// `pending -> downloading`; spawns the worker and returns immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, ctx: TaskContext) -> Result<()> {
        self.transition("start", TaskStatus::Pending, TaskStatus::Downloading)?;

        let cancel = CancellationToken::new();
        *lock(&self.control().cancel) = cancel.clone();
        self.control().pause_tx.send_replace(false);
        self.attach_events(ctx.event_tx.clone());

        let signals = Signals {
            cancel,
            pause: self.control().pause_tx.subscribe(),
        };
        self.emit(Event::Started { id: self.id() });
        tracing::info!(task_id = %self.id(), title = %self.item().title, "task started");

        *lock(&self.control().worker) = Some(Worker::spawn(self.clone().run(ctx, signals)));
        Ok(())
    }

    /// `downloading -> paused`; the worker halts before its next chunk
    pub fn pause(&self) -> Result<()> {
        self.transition("pause", TaskStatus::Downloading, TaskStatus::Paused)?;
        self.control().pause_tx.send_replace(true);
        tracing::info!(task_id = %self.id(), "task paused");
        Ok(())
    }

    /// `paused -> downloading`
    pub fn resume(&self) -> Result<()> {
        self.transition("resume", TaskStatus::Paused, TaskStatus::Downloading)?;
        self.control().pause_tx.send_replace(false);
        tracing::info!(task_id = %self.id(), "task resumed");
        Ok(())
    }

    /// Stop the task and wait (at most `timeout`) for its worker to exit
    ///
    /// The task ends in `error` with "stopped by user" unless the worker
    /// reached a terminal state first. Temp files are left for a later
    /// resume. A worker still running after `timeout` is aborted.
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        let status = self.status();
        if status.is_terminal() {
            return Err(self.invalid_state("stop", status));
        }

        lock(&self.control().cancel).cancel();
        let worker = lock(&self.control().worker).clone();

        if let Some(worker) = worker {
            if tokio::time::timeout(timeout, worker.exit).await.is_err() {
                tracing::warn!(
                    task_id = %self.id(),
                    timeout_ms = timeout.as_millis() as u64,
                    "worker did not exit in time, aborting"
                );
                worker.abort.abort();
            }
        }

        if self.settle(Terminal::Stopped) {
            tracing::info!(task_id = %self.id(), "task stopped by user");
        }
        Ok(())
    }

    /// Fail a task that never started (queue dropped at shutdown)
    pub(crate) fn abandon(&self, reason: &str) -> bool {
        self.settle(Terminal::Failed(reason.to_string()))
    }

    /// `error -> pending` with progress cleared and skip-if-exists off
    pub(crate) fn reset_for_retry(&self) -> Result<()> {
        self.update_state(|state| {
            if state.status != TaskStatus::Error {
                return Err(state.status);
            }
            state.status = TaskStatus::Pending;
            state.progress = 0.0;
            state.downloaded_bytes = 0;
            state.total_bytes = 0;
            state.speed_bps = 0;
            state.eta_secs = 0;
            state.error = None;
            state.output = None;
            state.finished_at = None;
            Ok(())
        })
        .map_err(|current| self.invalid_state("retry", current))?;

        self.set_options(|options| options.skip_if_exists = false);
        lock(&self.control().worker).take();
        self.control().finished.store(false, Ordering::SeqCst);
        Ok(())
    }
}
