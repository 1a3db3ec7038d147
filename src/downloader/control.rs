//! Task control and queries

use super::{DownloadManager, SchedulerState, TransferTask, lock};
use crate::error::{Error, Result};
use crate::types::{Event, QueueSnapshot, TaskId, TaskSnapshot};
use std::sync::atomic::Ordering;

impl DownloadManager {
    /// Pause a downloading task
    ///
    /// The worker finishes its current chunk write and then waits, keeping
    /// the connection open.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidState` unless the task is downloading.
    pub async fn pause(&self, id: TaskId) -> Result<()> {
        self.scheduler.task(id)?.pause()?;
        self.emit(Event::Paused { id });
        Ok(())
    }

    /// Resume a paused task
    pub async fn resume(&self, id: TaskId) -> Result<()> {
        self.scheduler.task(id)?.resume()?;
        self.emit(Event::Resumed { id });
        Ok(())
    }

    /// Stop a task
    ///
    /// A queued task is removed from the queue and recorded as failed. A
    /// running task is cancelled and joined for at most `stop_timeout`.
    /// Either way it ends in `error` with "stopped by user".
    pub async fn stop(&self, id: TaskId) -> Result<()> {
        let task = self.scheduler.task(id)?;

        let was_pending = {
            let mut state = lock(&self.scheduler.state);
            let queued = state.pending.iter().position(|pending| *pending == id);
            match queued {
                Some(index) => {
                    state.pending.remove(index);
                    state.failed.push(id);
                    true
                }
                None => false,
            }
        };
        if was_pending {
            tracing::info!(task_id = %id, "removed queued task");
        }

        task.stop(self.config.download.stop_timeout).await
    }

    /// Re-queue a failed task at the back of the queue
    ///
    /// Progress is reset and skip-if-exists is turned off, so a previous
    /// partial output is overwritten.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the task is in `error`; `ShuttingDown` after shutdown began.
    pub async fn retry(&self, id: TaskId) -> Result<()> {
        if !self.scheduler.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let task = self.scheduler.task(id)?;
        task.reset_for_retry()?;

        {
            let mut state = lock(&self.scheduler.state);
            state.failed.retain(|failed| *failed != id);
            state.pending.push_back(id);
        }
        self.emit(Event::Queued {
            id,
            title: task.item().title.clone(),
        });
        tracing::info!(task_id = %id, "task re-queued for retry");

        self.scheduler.admit();
        Ok(())
    }

    /// Snapshot of one task
    pub fn task_status(&self, id: TaskId) -> Result<TaskSnapshot> {
        Ok(self.scheduler.task(id)?.snapshot())
    }

    /// Snapshots of every task grouped by queue position
    ///
    /// Taken under the scheduler lock, so each task appears in exactly one group.
    pub fn snapshot(&self) -> QueueSnapshot {
        let state = lock(&self.scheduler.state);
        QueueSnapshot {
            active: snapshots(&state, &state.active),
            pending: snapshots(&state, &state.pending),
            completed: snapshots(&state, &state.completed),
            failed: snapshots(&state, &state.failed),
        }
    }
}

fn snapshots<'a>(state: &SchedulerState, ids: impl IntoIterator<Item = &'a TaskId>) -> Vec<TaskSnapshot> {
    ids.into_iter()
        .filter_map(|id| state.tasks.get(id).map(TransferTask::snapshot))
        .collect()
}
