//! FIFO queue, admission and completion bookkeeping

use super::{DownloadManager, Scheduler, TaskObserver, TransferTask, lock};
use crate::error::{DownloadError, Error, Result};
use crate::types::{Event, ItemDescriptor, TaskId, TaskOptions, TaskStatus};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

/// Observer the scheduler attaches at admission so the pool refills
struct CompletionHook(Weak<Scheduler>);

impl TaskObserver for CompletionHook {
    fn on_complete(&self, task: &TransferTask) {
        if let Some(scheduler) = self.0.upgrade() {
            scheduler.finish(task.id(), true);
        }
    }

    fn on_error(&self, task: &TransferTask, _error: &str) {
        if let Some(scheduler) = self.0.upgrade() {
            scheduler.finish(task.id(), false);
        }
    }
}

impl Scheduler {
    /// Append to the back of the pending queue, then run admission
    pub(crate) fn push(self: &Arc<Self>, task: TransferTask) {
        {
            let mut state = lock(&self.state);
            state.pending.push_back(task.id());
            state.tasks.insert(task.id(), task);
        }
        self.admit();
    }

    /// Start pending tasks, oldest first, while slots are free
    pub(crate) fn admit(self: &Arc<Self>) {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return;
        }

        let mut state = lock(&self.state);
        while state.active.len() < self.max_concurrency {
            let Some(id) = state.pending.pop_front() else {
                break;
            };
            let Some(task) = state.tasks.get(&id).cloned() else {
                continue;
            };

            state.active.push(id);
            task.attach_hook_once(Arc::new(CompletionHook(Arc::downgrade(self))));
            if let Err(e) = task.start(self.ctx.clone()) {
                tracing::error!(task_id = %id, error = %e, "failed to start task");
                state.active.retain(|active| *active != id);
                state.failed.push(id);
            }
        }

        tracing::debug!(
            active = state.active.len(),
            pending = state.pending.len(),
            "admission pass finished"
        );
    }

    /// Move a task that reached a terminal state out of the active set
    ///
    /// Idempotent: a task is recorded in `completed`/`failed` at most once.
    pub(crate) fn finish(self: &Arc<Self>, id: TaskId, succeeded: bool) {
        {
            let mut state = lock(&self.state);
            state.active.retain(|active| *active != id);
            state.pending.retain(|pending| *pending != id);
            if !state.completed.contains(&id) && !state.failed.contains(&id) {
                if succeeded {
                    state.completed.push(id);
                } else {
                    state.failed.push(id);
                }
            }
        }
        self.admit();
    }

    pub(crate) fn task(&self, id: TaskId) -> Result<TransferTask> {
        lock(&self.state)
            .tasks
            .get(&id)
            .cloned()
            .ok_or(Error::Download(DownloadError::NotFound { id }))
    }
}

impl DownloadManager {
    /// Build a pending task with a fresh ID without queueing it
    ///
    /// Useful to register a [`TaskObserver`] before [`enqueue_task`](Self::enqueue_task).
    pub fn new_task(&self, item: ItemDescriptor, options: TaskOptions) -> TransferTask {
        let id = TaskId(self.scheduler.next_id.fetch_add(1, Ordering::SeqCst));
        TransferTask::new(id, item, options)
    }

    /// Queue a download of `item`
    ///
    /// Returns immediately; the task starts as soon as a slot is free.
    ///
    /// # Errors
    ///
    /// Returns `ShuttingDown` once [`shutdown`](Self::shutdown) has begun.
    pub async fn enqueue(&self, item: ItemDescriptor, options: TaskOptions) -> Result<TaskId> {
        let task = self.new_task(item, options);
        self.enqueue_task(task).await
    }

    /// Queue a task built with [`new_task`](Self::new_task)
    pub async fn enqueue_task(&self, task: TransferTask) -> Result<TaskId> {
        if !self.scheduler.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let status = task.status();
        if status != TaskStatus::Pending || lock(&self.scheduler.state).tasks.contains_key(&task.id()) {
            return Err(Error::Download(DownloadError::InvalidState {
                id: task.id(),
                operation: "enqueue".to_string(),
                current_state: status.to_string(),
            }));
        }

        let id = task.id();
        task.set_options(|options| options.fill_defaults(&self.config.download));
        task.attach_events(self.event_tx.clone());
        self.emit(Event::Queued {
            id,
            title: task.item().title.clone(),
        });
        tracing::info!(task_id = %id, title = %task.item().title, "task queued");

        self.scheduler.push(task);
        Ok(id)
    }
}
