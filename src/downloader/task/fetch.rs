//! Resumable chunked stream download

use super::progress::ProgressTracker;
use super::{TaskContext, TransferTask};
use crate::error::{Error, Result};
use crate::retry::{Backoff, IsRetryable};
use crate::utils::file_len;
use futures::StreamExt;
use reqwest::StatusCode;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Stop and pause flags observed by a running worker
pub(crate) struct Signals {
    pub cancel: CancellationToken,
    pub pause: watch::Receiver<bool>,
}

impl Signals {
    /// Fails with `Stopped` once cancelled; waits while paused
    pub async fn checkpoint(&mut self, poll: Duration) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Stopped);
            }
            if !*self.pause.borrow() {
                return Ok(());
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Stopped),
                _ = self.pause.changed() => {}
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }
}

impl TransferTask {
    /// Download `url` into `dest`, retrying retryable failures
    ///
    /// Every attempt resumes from the size of `dest`, so a retry after a
    /// dropped connection only fetches the missing tail.
    pub(super) async fn fetch_stream(
        &self,
        ctx: &TaskContext,
        url: &str,
        dest: &Path,
        tracker: &mut ProgressTracker,
        signals: &mut Signals,
    ) -> Result<()> {
        let policy = Backoff::new(self.options().max_retries(), ctx.backoff_step);
        let mut attempt = 0;

        loop {
            match self.fetch_once(ctx, url, dest, tracker, signals).await {
                Ok(()) => break,
                Err(e) if e.is_retryable() && policy.has_next(attempt) => {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        task_id = %self.id(),
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "stream fetch failed, resuming after backoff"
                    );
                    tokio::select! {
                        _ = signals.cancel.cancelled() => return Err(Error::Stopped),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracker.finish_stream();
        self.publish_progress(ctx, tracker.sample(Instant::now()));
        Ok(())
    }

    async fn fetch_once(
        &self,
        ctx: &TaskContext,
        url: &str,
        dest: &Path,
        tracker: &mut ProgressTracker,
        signals: &mut Signals,
    ) -> Result<()> {
        signals.checkpoint(ctx.download.pause_poll_interval).await?;

        let offset = file_len(dest).await?;
        let response = tokio::select! {
            _ = signals.cancel.cancelled() => return Err(Error::Stopped),
            response = ctx.client.stream_request(url, offset) => response?,
        };

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            if offset > 0 {
                tracing::debug!(task_id = %self.id(), offset, "temp file already complete");
                tracker.begin_stream(offset, offset);
                return Ok(());
            }
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // 200 on a resume means the origin ignored the range
        let (mut file, start) = if status == StatusCode::PARTIAL_CONTENT && offset > 0 {
            (OpenOptions::new().append(true).open(dest).await?, offset)
        } else {
            (File::create(dest).await?, 0)
        };
        let expected = response.content_length().map(|len| len + start);
        tracker.begin_stream(start, expected.unwrap_or(0));
        tracing::debug!(task_id = %self.id(), start, ?expected, "stream opened");

        let copied = self.copy_body(ctx, response, &mut file, tracker, signals).await;
        let flushed = file.flush().await;
        let written = copied?;
        flushed?;

        match expected {
            Some(expected) if start + written < expected => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("stream ended at {} of {expected} bytes", start + written),
            ))),
            _ => Ok(()),
        }
    }

    async fn copy_body(
        &self,
        ctx: &TaskContext,
        response: reqwest::Response,
        file: &mut File,
        tracker: &mut ProgressTracker,
        signals: &mut Signals,
    ) -> Result<u64> {
        let chunk_size = ctx.download.chunk_size.max(1);
        let poll = ctx.download.pause_poll_interval;
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let next = tokio::select! {
                _ = signals.cancel.cancelled() => return Err(Error::Stopped),
                next = body.next() => next,
            };
            let Some(bytes) = next else {
                return Ok(written);
            };
            let bytes = bytes?;

            for chunk in bytes.chunks(chunk_size) {
                file.write_all(chunk).await?;
                written += chunk.len() as u64;
                tracker.record(chunk.len() as u64);

                signals.checkpoint(poll).await?;

                let now = Instant::now();
                if tracker.is_due(now) {
                    self.publish_progress(ctx, tracker.sample(now));
                }
            }
        }
    }
}
