//! ffmpeg-backed media processor

use super::traits::MediaProcessor;
use crate::config::ToolsConfig;
use crate::error::Error;
use crate::types::OutputFormat;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const TOOL: &str = "ffmpeg";

/// Environment variable naming the directory that contains ffmpeg
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";

/// Media processor that shells out to `ffmpeg`
///
/// # Examples
///
/// ```no_run
/// use bili_dl::media::{FfmpegProcessor, MediaProcessor};
/// use std::path::{Path, PathBuf};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Create with explicit path
/// let processor = FfmpegProcessor::new(PathBuf::from("/usr/bin/ffmpeg"));
///
/// // Or auto-discover from PATH
/// let processor = FfmpegProcessor::from_path().expect("ffmpeg not found in PATH");
///
/// processor
///     .mux(Path::new("a_video.tmp"), Path::new("a_audio.tmp"), Path::new("a.mp4"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FfmpegProcessor {
    binary_path: PathBuf,
    audio_bitrate: String,
}

impl FfmpegProcessor {
    /// Create a processor with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            audio_bitrate: "192k".to_string(),
        }
    }

    /// Override the bitrate used for lossy audio extraction
    pub fn with_audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = bitrate.into();
        self
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path() -> Option<Self> {
        which::which(TOOL).ok().map(Self::new)
    }

    /// Look for the binary inside the directory named by `FFMPEG_PATH`
    pub fn from_env() -> Option<Self> {
        let dir = std::env::var_os(FFMPEG_PATH_ENV)?;
        let candidate = PathBuf::from(dir).join(binary_file_name());
        candidate.is_file().then(|| Self::new(candidate))
    }

    /// Resolve the binary from configuration: explicit path, then `FFMPEG_PATH`,
    /// then a PATH search when `search_path` is enabled
    pub fn from_config(tools: &ToolsConfig) -> Option<Self> {
        let found = match &tools.ffmpeg_path {
            Some(path) => Some(Self::new(path.clone())),
            None => Self::from_env().or_else(|| {
                if tools.search_path {
                    Self::from_path()
                } else {
                    None
                }
            }),
        };
        found.map(|p| p.with_audio_bitrate(tools.audio_bitrate.clone()))
    }

    /// Path of the binary this processor runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn run(&self, args: Vec<OsString>) -> crate::Result<()> {
        tracing::debug!(binary = %self.binary_path.display(), ?args, "running ffmpeg");

        let output = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::ToolUnavailable(format!("{} not found", self.binary_path.display()))
                } else {
                    Error::ToolUnavailable(format!("failed to execute {}: {e}", self.binary_path.display()))
                }
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::external_tool(TOOL, output.status.code(), &output.stderr))
        }
    }
}

fn binary_file_name() -> &'static str {
    if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" }
}

/// Arguments for extracting the audio track of `input` into `output`
pub(crate) fn extract_audio_args(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    bitrate: &str,
) -> crate::Result<Vec<OsString>> {
    let codec = match format {
        OutputFormat::Mp3 => "libmp3lame",
        OutputFormat::Aac => "aac",
        OutputFormat::Flac => "flac",
        other => {
            return Err(Error::Other(format!(
                "{} is not an audio format",
                other.extension()
            )));
        }
    };

    let mut args: Vec<OsString> = vec![
        "-nostdin".into(),
        "-y".into(),
        "-i".into(),
        input.into(),
        "-vn".into(),
        "-acodec".into(),
        codec.into(),
    ];
    // flac is lossless; a bitrate makes no sense there
    if format != OutputFormat::Flac {
        args.push("-ab".into());
        args.push(bitrate.into());
    }
    args.push(output.into());
    Ok(args)
}

/// Arguments for muxing video + audio into `output` (video copied, audio to aac)
pub(crate) fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-nostdin".into(),
        "-y".into(),
        "-i".into(),
        video.into(),
        "-i".into(),
        audio.into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-strict".into(),
        "experimental".into(),
        output.into(),
    ]
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn is_available(&self) -> bool {
        match Command::new(&self.binary_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) => output.status.success(),
            Err(e) => {
                tracing::debug!(error = %e, binary = %self.binary_path.display(), "ffmpeg not executable");
                false
            }
        }
    }

    async fn extract_audio(&self, input: &Path, output: &Path, format: OutputFormat) -> crate::Result<()> {
        let args = extract_audio_args(input, output, format, &self.audio_bitrate)?;
        self.run(args).await
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> crate::Result<()> {
        self.run(mux_args(video, audio, output)).await
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
