//! External media tool integration
//!
//! The transfer pipeline needs two operations it delegates to an external
//! tool: extracting an audio track into an audio container, and muxing a
//! video elementary stream with an audio stream. Both sit behind the
//! [`MediaProcessor`] trait:
//!
//! - [`FfmpegProcessor`]: runs the `ffmpeg` binary
//! - [`MissingProcessor`]: installed when no binary is found; every operation
//!   fails with [`Error::ToolUnavailable`](crate::Error::ToolUnavailable)
//!
//! ## Usage
//!
//! ```no_run
//! use bili_dl::config::ToolsConfig;
//! use bili_dl::media::{self, MediaProcessor};
//! use std::path::Path;
//!
//! # async fn example() -> bili_dl::Result<()> {
//! let processor = media::detect(&ToolsConfig::default());
//! if processor.is_available().await {
//!     processor
//!         .mux(Path::new("clip_video.tmp"), Path::new("clip_audio.tmp"), Path::new("clip.mp4"))
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

mod cli;
mod missing;
mod traits;

pub use cli::FfmpegProcessor;
pub use missing::MissingProcessor;
pub use traits::MediaProcessor;

use crate::config::ToolsConfig;
use std::sync::Arc;

/// Pick the processor for the given tool configuration
///
/// Falls back to [`MissingProcessor`] (with a warning) when no ffmpeg binary
/// can be located, so the engine still starts and tasks fail individually.
pub fn detect(tools: &ToolsConfig) -> Arc<dyn MediaProcessor> {
    match FfmpegProcessor::from_config(tools) {
        Some(processor) => {
            tracing::info!(path = %processor.binary_path().display(), "using ffmpeg");
            Arc::new(processor)
        }
        None => {
            tracing::warn!("ffmpeg not found; downloads will fail until it is installed");
            Arc::new(MissingProcessor)
        }
    }
}
