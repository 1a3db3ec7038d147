//! Trait for the external media tool

use crate::types::OutputFormat;
use async_trait::async_trait;
use std::path::Path;

/// Operations the transfer pipeline delegates to an external media tool
///
/// Implementations report failure through the process exit status; the
/// diagnostic text (stderr) travels in [`Error::ExternalTool`](crate::Error::ExternalTool).
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Whether the tool can be executed right now
    async fn is_available(&self) -> bool;

    /// Extract the audio track of `input` into `output` using the codec for `format`
    ///
    /// # Errors
    ///
    /// - `ToolUnavailable` if the tool cannot be executed
    /// - `ExternalTool` if it exits with a failure status
    /// - `Other` if `format` is not an audio format
    async fn extract_audio(&self, input: &Path, output: &Path, format: OutputFormat) -> crate::Result<()>;

    /// Combine a video stream and an audio stream into `output` without re-encoding video
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> crate::Result<()>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
