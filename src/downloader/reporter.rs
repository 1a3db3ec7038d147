//! Logging consumer for the event channel

use super::DownloadManager;
use crate::types::Event;
use crate::utils::{format_eta, format_size, format_speed};
use tokio::sync::broadcast::error::RecvError;

/// Spawn one task that logs every event until the channel closes or
/// [`Event::Shutdown`] arrives
///
/// State changes log at `info`, progress at `debug`. The library never
/// installs a subscriber; this only emits `tracing` records.
pub fn spawn_event_reporter(manager: &DownloadManager) -> tokio::task::JoinHandle<()> {
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Event::Shutdown) => {
                    tracing::info!("manager shut down");
                    break;
                }
                Ok(event) => report(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event reporter lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn report(event: &Event) {
    match event {
        Event::Queued { id, title } => tracing::info!(task_id = %id, %title, "queued"),
        Event::Started { id } => tracing::info!(task_id = %id, "started"),
        Event::Progress {
            id,
            percent,
            downloaded,
            total,
            speed_bps,
            eta_secs,
        } => tracing::debug!(
            task_id = %id,
            percent = f64::from(*percent),
            downloaded = %format_size(*downloaded),
            total = %format_size(*total),
            speed = %format_speed(*speed_bps),
            eta = %format_eta(*eta_secs),
            "progress"
        ),
        Event::Paused { id } => tracing::info!(task_id = %id, "paused"),
        Event::Resumed { id } => tracing::info!(task_id = %id, "resumed"),
        Event::Merging { id, output } => {
            tracing::info!(task_id = %id, output = %output.display(), "merging")
        }
        Event::Completed { id, output } => {
            tracing::info!(task_id = %id, output = %output.display(), "completed")
        }
        Event::Skipped { id, output } => {
            tracing::info!(task_id = %id, output = %output.display(), "skipped, output exists")
        }
        Event::Failed { id, error } => tracing::info!(task_id = %id, %error, "failed"),
        Event::Stopped { id } => tracing::info!(task_id = %id, "stopped"),
        Event::Shutdown => tracing::info!("shutdown"),
    }
}
