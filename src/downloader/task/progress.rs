//! Windowed speed and ETA tracking across a task's streams

use super::{TaskContext, TransferTask};
use crate::types::Event;
use std::time::{Duration, Instant};

/// Values published with one progress update
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProgressSample {
    pub percent: f32,
    pub downloaded: u64,
    pub total: u64,
    pub speed_bps: u64,
    pub eta_secs: u64,
}

/// Cumulative byte counters plus a speed window
///
/// `downloaded`/`total` span every stream of the task: finished streams
/// contribute their final counts, the current stream its running counts.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    interval: Duration,
    finished_downloaded: u64,
    finished_total: u64,
    current_downloaded: u64,
    current_total: u64,
    window_start: Instant,
    window_bytes: u64,
    speed_bps: u64,
}

impl ProgressTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            finished_downloaded: 0,
            finished_total: 0,
            current_downloaded: 0,
            current_total: 0,
            window_start: Instant::now(),
            window_bytes: 0,
            speed_bps: 0,
        }
    }

    /// Start counting a stream that already has `offset` bytes on disk
    pub fn begin_stream(&mut self, offset: u64, total: u64) {
        self.current_downloaded = offset;
        self.current_total = total;
        self.window_start = Instant::now();
        self.window_bytes = 0;
    }

    pub fn record(&mut self, bytes: u64) {
        self.current_downloaded += bytes;
        self.window_bytes += bytes;
    }

    pub fn finish_stream(&mut self) {
        self.finished_downloaded += self.current_downloaded;
        self.finished_total += self.current_total.max(self.current_downloaded);
        self.current_downloaded = 0;
        self.current_total = 0;
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.duration_since(self.window_start) >= self.interval
    }

    /// Close the current window and compute a sample
    pub fn sample(&mut self, now: Instant) -> ProgressSample {
        let elapsed = now.duration_since(self.window_start).as_secs_f64();
        if elapsed > 0.0 {
            self.speed_bps = (self.window_bytes as f64 / elapsed) as u64;
        }
        self.window_start = now;
        self.window_bytes = 0;

        let downloaded = self.finished_downloaded + self.current_downloaded;
        let total = self.finished_total + self.current_total;
        let percent = if total == 0 {
            0.0
        } else {
            ((downloaded as f64 / total as f64) * 100.0).min(100.0) as f32
        };
        let eta_secs = if self.speed_bps == 0 {
            0
        } else {
            total.saturating_sub(downloaded) / self.speed_bps
        };

        ProgressSample {
            percent,
            downloaded,
            total,
            speed_bps: self.speed_bps,
            eta_secs,
        }
    }
}

impl TransferTask {
    /// Store the sample, broadcast it and notify observers
    pub(super) fn publish_progress(&self, ctx: &TaskContext, sample: ProgressSample) {
        self.update_state(|state| {
            state.progress = sample.percent;
            state.downloaded_bytes = sample.downloaded;
            state.total_bytes = sample.total;
            state.speed_bps = sample.speed_bps;
            state.eta_secs = sample.eta_secs;
        });
        ctx.emit(Event::Progress {
            id: self.id(),
            percent: sample.percent,
            downloaded: sample.downloaded,
            total: sample.total,
            speed_bps: sample.speed_bps,
            eta_secs: sample.eta_secs,
        });
        self.notify_progress();
    }
}
