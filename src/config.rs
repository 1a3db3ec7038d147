//! Configuration types for bili-dl

use crate::types::{OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Remote API access configuration (origin, pacing, retry policy)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Origin base URL (default: "https://api.bilibili.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Minimum delay between consecutive requests (default: 2 seconds)
    ///
    /// Shared by every task using the same client.
    #[serde(default = "default_request_delay", with = "duration_ms_serde")]
    pub request_delay: Duration,

    /// Total attempts for one API call before giving up (default: 5)
    #[serde(default = "default_api_retries")]
    pub max_retries: u32,

    /// Linear backoff step: wait = (attempt + 1) * step (default: 3 seconds)
    #[serde(default = "default_backoff_step", with = "duration_ms_serde")]
    pub backoff_step: Duration,

    /// Per-request timeout for API calls (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Referer header; the stream CDN rejects requests without it
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Page size for paginated listings (default: 30)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_delay: default_request_delay(),
            max_retries: default_api_retries(),
            backoff_step: default_backoff_step(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            referer: default_referer(),
            page_size: default_page_size(),
        }
    }
}

/// Download behavior configuration (directories, concurrency, defaults, pacing)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum concurrent transfers (default: 5)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Quality tier used when the caller does not pick one
    #[serde(default)]
    pub default_quality: Quality,

    /// Container used for video downloads (default: mp4)
    #[serde(default = "default_video_format")]
    pub default_video_format: OutputFormat,

    /// Container used for audio-only downloads (default: mp3)
    #[serde(default = "default_audio_format")]
    pub default_audio_format: OutputFormat,

    /// Fetch the cover image next to video outputs (default: true)
    #[serde(default = "default_true")]
    pub download_cover: bool,

    /// Retry budget for each stream fetch (default: 3)
    #[serde(default = "default_task_retries")]
    pub max_retries: u32,

    /// Write granularity in bytes; stop/pause are checked between writes (default: 8192)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Minimum interval between progress updates (default: 500 ms)
    #[serde(default = "default_progress_interval", with = "duration_ms_serde")]
    pub progress_interval: Duration,

    /// Upper bound on how long a paused transfer waits before re-checking its flags (default: 100 ms)
    #[serde(default = "default_pause_poll_interval", with = "duration_ms_serde")]
    pub pause_poll_interval: Duration,

    /// How long `stop()` waits for a worker to exit (default: 5 seconds)
    #[serde(default = "default_stop_timeout", with = "duration_serde")]
    pub stop_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            default_quality: Quality::default(),
            default_video_format: default_video_format(),
            default_audio_format: default_audio_format(),
            download_cover: true,
            max_retries: default_task_retries(),
            chunk_size: default_chunk_size(),
            progress_interval: default_progress_interval(),
            pause_poll_interval: default_pause_poll_interval(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

/// External tool configuration (ffmpeg)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Bitrate for lossy audio extraction (default: "192k")
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

/// Session (cookie store) configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// JSON cookie blob produced by an external login flow
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
}

/// Main configuration for the download engine
///
/// Fields are organized into sub-configs:
/// - [`api`](ApiConfig): origin, pacing, retry policy
/// - [`download`](DownloadConfig): directories, concurrency, transfer tuning
/// - [`tools`](ToolsConfig): ffmpeg discovery
/// - [`session`](SessionConfig): cookie store
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API access
    #[serde(default)]
    pub api: ApiConfig,

    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// External tools
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Session store
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Check values that would make the engine unusable
    pub fn validate(&self) -> crate::Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(crate::Error::Config {
                message: "must be at least 1".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }
        if self.api.max_retries == 0 {
            return Err(crate::Error::Config {
                message: "must be at least 1".to_string(),
                key: Some("api.max_retries".to_string()),
            });
        }
        if self.download.chunk_size == 0 {
            return Err(crate::Error::Config {
                message: "must be greater than zero".to_string(),
                key: Some("chunk_size".to_string()),
            });
        }
        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(crate::Error::Config {
                message: format!("invalid URL: {}", self.api.base_url),
                key: Some("api.base_url".to_string()),
            });
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.bilibili.com".to_string()
}

fn default_request_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_api_retries() -> u32 {
    5
}

fn default_backoff_step() -> Duration {
    Duration::from_secs(3)
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_referer() -> String {
    "https://www.bilibili.com".to_string()
}

fn default_page_size() -> u32 {
    30
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    5
}

fn default_video_format() -> OutputFormat {
    OutputFormat::Mp4
}

fn default_audio_format() -> OutputFormat {
    OutputFormat::Mp3
}

fn default_true() -> bool {
    true
}

fn default_task_retries() -> u32 {
    3
}

fn default_chunk_size() -> usize {
    8192
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_pause_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds, for sub-second pacing values)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
