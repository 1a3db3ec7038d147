//! Placeholder processor used when no media tool is installed

use super::traits::MediaProcessor;
use crate::types::OutputFormat;
use async_trait::async_trait;
use std::path::Path;

const HINT: &str = "ffmpeg not found. Install it, set tools.ffmpeg_path, or point FFMPEG_PATH at its directory.";

/// Processor that is never available
///
/// Lets the engine start without ffmpeg; each task then fails with
/// `ToolUnavailable` before any network activity.
///
/// # Examples
///
/// ```
/// use bili_dl::media::{MediaProcessor, MissingProcessor};
///
/// # #[tokio::main]
/// # async fn main() {
/// assert!(!MissingProcessor.is_available().await);
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingProcessor;

#[async_trait]
impl MediaProcessor for MissingProcessor {
    async fn is_available(&self) -> bool {
        false
    }

    async fn extract_audio(&self, _input: &Path, _output: &Path, _format: OutputFormat) -> crate::Result<()> {
        Err(crate::Error::ToolUnavailable(HINT.into()))
    }

    async fn mux(&self, _video: &Path, _audio: &Path, _output: &Path) -> crate::Result<()> {
        Err(crate::Error::ToolUnavailable(HINT.into()))
    }

    fn name(&self) -> &'static str {
        "missing"
    }
}
