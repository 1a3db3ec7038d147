//! Execution algorithm for one task run

use super::fetch::Signals;
use super::progress::ProgressTracker;
use super::{TaskContext, Terminal, TransferTask};
use crate::error::{DownloadError, Error, Result};
use crate::types::{Event, ItemDescriptor, TaskStatus};
use crate::utils::{remove_file_if_exists, sanitize_filename};
use chrono::Utc;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;

const COVER_TIMEOUT: Duration = Duration::from_secs(10);

enum Finished {
    Completed(PathBuf),
    Skipped(PathBuf),
}

impl TransferTask {
    /// Worker body; runs once per `start()`
    pub(super) async fn run(self, ctx: TaskContext, mut signals: Signals) {
        let outcome = match self.execute(&ctx, &mut signals).await {
            Ok(Finished::Completed(path)) => Terminal::Completed(path),
            Ok(Finished::Skipped(path)) => Terminal::Skipped(path),
            // stop() owns the terminal transition for a user stop
            Err(Error::Stopped) => return,
            Err(e) => Terminal::Failed(e.to_string()),
        };
        self.settle(outcome);
    }

    async fn execute(&self, ctx: &TaskContext, signals: &mut Signals) -> Result<Finished> {
        if !ctx.processor.is_available().await {
            return Err(Error::ToolUnavailable(format!(
                "{} is not installed or not executable",
                ctx.processor.name()
            )));
        }

        let options = self.options();
        let item = match self.item().cid {
            Some(_) => self.item().clone(),
            None => cancellable(signals, ctx.resolver.hydrate(self.item())).await?,
        };
        let cid = item
            .cid
            .ok_or_else(|| Error::Malformed(format!("item {} has no content id", item.bvid)))?;

        let name = sanitize_filename(options.custom_filename.as_deref().unwrap_or(&item.title));
        let dir = options.output_dir.clone();
        let output = dir.join(format!("{name}.{}", options.format().extension()));

        if options.skip_if_exists && tokio::fs::try_exists(&output).await.unwrap_or(false) {
            tracing::info!(task_id = %self.id(), path = %output.display(), "output exists, skipping");
            return Ok(Finished::Skipped(output));
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DownloadError::OutputDir {
                path: dir.clone(),
                reason: e.to_string(),
            })?;

        let streams = cancellable(signals, ctx.resolver.resolve_streams(&item.bvid, cid, options.quality())).await?;
        tracing::debug!(task_id = %self.id(), quality = streams.quality_code, "streams resolved");

        let mut tracker = ProgressTracker::new(ctx.download.progress_interval);
        let audio_tmp = dir.join(format!("{name}_audio.tmp"));

        if options.format().is_audio() {
            self.fetch_stream(ctx, &streams.audio_url, &audio_tmp, &mut tracker, signals)
                .await?;
            let step = ctx.processor.extract_audio(&audio_tmp, &output, options.format());
            self.merge(ctx, signals, &output, &[audio_tmp.as_path()], step)
                .await?;
            discard_temp(&audio_tmp).await;
        } else {
            let video_tmp = dir.join(format!("{name}_video.tmp"));
            self.fetch_stream(ctx, &streams.video_url, &video_tmp, &mut tracker, signals)
                .await?;
            self.fetch_stream(ctx, &streams.audio_url, &audio_tmp, &mut tracker, signals)
                .await?;
            let step = ctx.processor.mux(&video_tmp, &audio_tmp, &output);
            self.merge(ctx, signals, &output, &[video_tmp.as_path(), audio_tmp.as_path()], step)
                .await?;
            discard_temp(&video_tmp).await;
            discard_temp(&audio_tmp).await;

            if options.download_cover() {
                self.fetch_cover(ctx, &item, &dir.join(format!("{name}_cover.jpg")))
                    .await;
            }
        }

        Ok(Finished::Completed(output))
    }

    /// Run the external step; a failed or stopped step leaves no final-named file
    ///
    /// Inputs the tool rejected are discarded too, so a retry fetches them again.
    async fn merge<F>(
        &self,
        ctx: &TaskContext,
        signals: &mut Signals,
        output: &Path,
        inputs: &[&Path],
        step: F,
    ) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        signals.checkpoint(ctx.download.pause_poll_interval).await?;
        ctx.emit(Event::Merging {
            id: self.id(),
            output: output.to_path_buf(),
        });
        tracing::info!(task_id = %self.id(), tool = ctx.processor.name(), "merging streams");

        let result = tokio::select! {
            _ = signals.cancel.cancelled() => Err(Error::Stopped),
            result = step => result,
        };
        if result.is_err() {
            if let Err(e) = remove_file_if_exists(output).await {
                tracing::warn!(path = %output.display(), error = %e, "failed to remove partial output");
            }
        }
        if matches!(result, Err(Error::ExternalTool { .. })) {
            for input in inputs {
                discard_temp(input).await;
            }
        }
        result
    }

    async fn fetch_cover(&self, ctx: &TaskContext, item: &ItemDescriptor, path: &Path) {
        let Some(url) = item.thumbnail.as_deref().filter(|url| !url.is_empty()) else {
            return;
        };
        let url = if url.starts_with("//") {
            format!("https:{url}")
        } else {
            url.to_string()
        };

        let result = match ctx.client.fetch_bytes(&url, COVER_TIMEOUT).await {
            Ok(bytes) => tokio::fs::write(path, bytes).await.map_err(Error::from),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(task_id = %self.id(), error = %e, "cover download failed");
        }
    }

    /// Apply the terminal state once; later calls are no-ops
    ///
    /// Returns whether this call performed the transition.
    pub(super) fn settle(&self, outcome: Terminal) -> bool {
        if self.control().finished.swap(true, Ordering::SeqCst) {
            return false;
        }

        let (status, error, output) = match &outcome {
            Terminal::Completed(path) => (TaskStatus::Completed, None, Some(path.clone())),
            Terminal::Skipped(path) => (TaskStatus::Skipped, None, Some(path.clone())),
            Terminal::Failed(message) => (TaskStatus::Error, Some(message.clone()), None),
            Terminal::Stopped => (TaskStatus::Error, Some(Error::Stopped.to_string()), None),
        };
        self.update_state(|state| {
            state.status = status;
            state.error = error.clone();
            state.output = output;
            state.speed_bps = 0;
            state.eta_secs = 0;
            state.finished_at = Some(Utc::now());
            if status != TaskStatus::Error {
                state.progress = 100.0;
            }
        });

        let id = self.id();
        match &outcome {
            Terminal::Completed(path) => {
                tracing::info!(task_id = %id, path = %path.display(), "task completed");
                self.emit(Event::Completed { id, output: path.clone() });
            }
            Terminal::Skipped(path) => self.emit(Event::Skipped { id, output: path.clone() }),
            Terminal::Failed(message) => {
                tracing::error!(task_id = %id, error = %message, "task failed");
                self.emit(Event::Failed { id, error: message.clone() });
            }
            Terminal::Stopped => self.emit(Event::Stopped { id }),
        }

        for observer in self.observers() {
            match &error {
                Some(message) => observer.on_error(self, message),
                None => observer.on_complete(self),
            }
        }
        true
    }
}

/// Await `future` unless the task is stopped first
async fn cancellable<T>(signals: &Signals, future: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        _ = signals.cancel.cancelled() => Err(Error::Stopped),
        result = future => result,
    }
}

async fn discard_temp(path: &Path) {
    if let Err(e) = remove_file_if_exists(path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file");
    }
}
