//! Shutdown coordination.

use super::{DownloadManager, TransferTask, lock};
use crate::error::Error;
use crate::types::Event;
use std::sync::atomic::Ordering;

impl DownloadManager {
    /// Gracefully shut down the manager
    ///
    /// 1. Stops accepting new tasks (`enqueue` and `retry` fail with `ShuttingDown`)
    /// 2. Drops every queued task, recording it as failed
    /// 3. Stops all active tasks concurrently, each bounded by `stop_timeout`
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Temp files of interrupted transfers stay on disk for a later resume.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");

        self.scheduler.accepting_new.store(false, Ordering::SeqCst);

        let (dropped, active): (Vec<TransferTask>, Vec<TransferTask>) = {
            let mut state = lock(&self.scheduler.state);
            let pending: Vec<_> = state.pending.drain(..).collect();
            state.failed.extend(pending.iter().copied());
            let dropped = pending
                .iter()
                .filter_map(|id| state.tasks.get(id).cloned())
                .collect();
            let active = state
                .active
                .iter()
                .filter_map(|id| state.tasks.get(id).cloned())
                .collect();
            (dropped, active)
        };

        let reason = Error::ShuttingDown.to_string();
        for task in &dropped {
            task.abandon(&reason);
        }
        tracing::info!(dropped = dropped.len(), active = active.len(), "Stopping tasks");

        let timeout = self.config.download.stop_timeout;
        let results = futures::future::join_all(active.iter().map(|task| task.stop(timeout))).await;
        for (task, result) in active.iter().zip(results) {
            // A task may reach a terminal state on its own while shutdown runs
            if let Err(e) = result {
                tracing::debug!(task_id = %task.id(), error = %e, "task already finished");
            }
        }

        self.emit(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
    }

    /// Whether [`shutdown`](Self::shutdown) has begun
    pub fn is_shutting_down(&self) -> bool {
        !self.scheduler.accepting_new.load(Ordering::SeqCst)
    }
}
