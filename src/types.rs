//! Core types for bili-dl

use crate::config::DownloadConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a transfer task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Transfer task lifecycle status
///
/// `pending -> downloading -> {completed, error, skipped}`, `downloading <-> paused`,
/// and any non-terminal state can move to `error` through a user stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for admission
    Pending,
    /// Transfer running
    Downloading,
    /// Paused by user (worker idle between chunks)
    Paused,
    /// Output written successfully
    Completed,
    /// Failed or stopped; see the task's last error
    Error,
    /// Output already existed, nothing transferred
    Skipped,
}

impl TaskStatus {
    /// Terminal states are never left (except through an explicit manual retry reset)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Error | TaskStatus::Skipped
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// User-facing quality tier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quality {
    /// 360P
    #[serde(rename = "360P")]
    Q360,
    /// 480P
    #[serde(rename = "480P")]
    Q480,
    /// 720P
    #[serde(rename = "720P")]
    Q720,
    /// 1080P (highest tier, default)
    #[default]
    #[serde(rename = "1080P")]
    Q1080,
}

impl Quality {
    /// Numeric quality code understood by the origin (`qn` parameter)
    pub fn code(&self) -> u32 {
        match self {
            Quality::Q1080 => 80,
            Quality::Q720 => 64,
            Quality::Q480 => 32,
            Quality::Q360 => 16,
        }
    }

    /// Parse a tier label such as "720P"; unknown labels fall back to the highest tier
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "1080P" => Quality::Q1080,
            "720P" => Quality::Q720,
            "480P" => Quality::Q480,
            "360P" => Quality::Q360,
            _ => Quality::Q1080,
        }
    }

    /// Display label ("1080P", ...)
    pub fn label(&self) -> &'static str {
        match self {
            Quality::Q1080 => "1080P",
            Quality::Q720 => "720P",
            Quality::Q480 => "480P",
            Quality::Q360 => "360P",
        }
    }
}

/// Output container format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// MPEG-4 (default)
    #[default]
    Mp4,
    /// AVI
    Avi,
    /// FLV
    Flv,
    /// Matroska
    Mkv,
    /// MP3 audio
    Mp3,
    /// AAC audio
    Aac,
    /// FLAC audio
    Flac,
}

impl OutputFormat {
    /// Audio-only formats skip the video stream entirely
    pub fn is_audio(&self) -> bool {
        matches!(self, OutputFormat::Mp3 | OutputFormat::Aac | OutputFormat::Flac)
    }

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Avi => "avi",
            OutputFormat::Flv => "flv",
            OutputFormat::Mkv => "mkv",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Aac => "aac",
            OutputFormat::Flac => "flac",
        }
    }

    /// Parse an extension-style name ("mp4", "MP3")
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mp4" => Some(OutputFormat::Mp4),
            "avi" => Some(OutputFormat::Avi),
            "flv" => Some(OutputFormat::Flv),
            "mkv" => Some(OutputFormat::Mkv),
            "mp3" => Some(OutputFormat::Mp3),
            "aac" => Some(OutputFormat::Aac),
            "flac" => Some(OutputFormat::Flac),
            _ => None,
        }
    }
}

/// One part of a multi-part item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Content identifier (stream-selector token) of this part
    pub cid: u64,
    /// 1-based part number
    pub page: u32,
    /// Part title
    pub title: String,
    /// Normalized duration (`MM:SS` or `HH:MM:SS`)
    pub duration: String,
}

/// Identifies one downloadable unit
///
/// Produced by the resolver and never mutated afterwards; expanding parts
/// yields new descriptors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// Stable item identifier (BV id)
    pub bvid: String,
    /// Numeric archive id, when the origin reported one
    pub aid: Option<u64>,
    /// Content identifier; `None` for collection members not yet hydrated
    pub cid: Option<u64>,
    /// Human title
    pub title: String,
    /// Title of the item this part was expanded from
    pub parent_title: Option<String>,
    /// Owner display name
    pub author: Option<String>,
    /// Owner id
    pub owner_mid: Option<u64>,
    /// Description text
    pub description: Option<String>,
    /// Normalized duration (`MM:SS` or `HH:MM:SS`)
    pub duration: String,
    /// Publication time (unix seconds)
    pub pubdate: Option<i64>,
    /// Thumbnail (cover) URL
    pub thumbnail: Option<String>,
    /// Ordered parts; more than one means a multi-part item
    pub parts: Vec<Part>,
}

impl ItemDescriptor {
    /// Descriptor carrying only what a collection listing provides
    pub fn listing_entry(bvid: impl Into<String>, title: impl Into<String>, duration: String) -> Self {
        Self {
            bvid: bvid.into(),
            aid: None,
            cid: None,
            title: title.into(),
            parent_title: None,
            author: None,
            owner_mid: None,
            description: None,
            duration,
            pubdate: None,
            thumbnail: None,
            parts: Vec::new(),
        }
    }

    /// Whether the item has more than one part
    pub fn is_multi_part(&self) -> bool {
        self.parts.len() > 1
    }

    /// Expand a multi-part item into one descriptor per part
    ///
    /// Each part keeps the parent's author and owner, gets its own content id,
    /// and is titled `"<parent> - <part>"`. Single-part items return themselves.
    pub fn expand_parts(&self) -> Vec<ItemDescriptor> {
        if !self.is_multi_part() {
            return vec![self.clone()];
        }

        self.parts
            .iter()
            .map(|part| ItemDescriptor {
                cid: Some(part.cid),
                title: format!("{} - {}", self.title, part.title),
                parent_title: Some(self.title.clone()),
                duration: part.duration.clone(),
                parts: Vec::new(),
                ..self.clone()
            })
            .collect()
    }
}

/// Transport locators for one item at one quality
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSet {
    /// Video elementary stream URL (time-limited)
    pub video_url: String,
    /// Audio elementary stream URL (time-limited)
    pub audio_url: String,
    /// Quality code the origin actually served
    pub quality_code: u32,
}

/// Result of resolving a user-supplied reference
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedSource {
    /// One item, possibly multi-part
    SingleItem(ItemDescriptor),
    /// An ordered group of items
    Collection {
        /// Collection title
        title: String,
        /// Members in listing order
        items: Vec<ItemDescriptor>,
    },
}

/// Per-task options
///
/// Unset fields are filled from [`DownloadConfig`] when the task is queued
/// through a [`DownloadManager`](crate::DownloadManager).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Destination directory
    pub output_dir: PathBuf,
    /// Requested quality tier
    #[serde(default)]
    pub quality: Option<Quality>,
    /// Output container format
    #[serde(default)]
    pub format: Option<OutputFormat>,
    /// Pick the default audio format instead of the video one when `format` is unset
    #[serde(default)]
    pub audio_only: bool,
    /// Fetch the cover image next to video outputs
    #[serde(default)]
    pub download_cover: Option<bool>,
    /// Filename override (without extension)
    #[serde(default)]
    pub custom_filename: Option<String>,
    /// Retry budget for each stream fetch
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Skip the transfer when the final output already exists
    #[serde(default)]
    pub skip_if_exists: bool,
}

impl TaskOptions {
    /// Options for the given directory with every other field unset
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            quality: None,
            format: None,
            audio_only: false,
            download_cover: None,
            custom_filename: None,
            max_retries: None,
            skip_if_exists: false,
        }
    }

    /// Fill every unset field from the configured defaults
    pub fn fill_defaults(&mut self, config: &DownloadConfig) {
        self.quality.get_or_insert(config.default_quality);
        self.format.get_or_insert(if self.audio_only {
            config.default_audio_format
        } else {
            config.default_video_format
        });
        self.download_cover.get_or_insert(config.download_cover);
        self.max_retries.get_or_insert(config.max_retries);
    }

    /// Effective quality tier
    pub fn quality(&self) -> Quality {
        self.resolved(|o| o.quality, |c| c.default_quality)
    }

    /// Effective output format
    pub fn format(&self) -> OutputFormat {
        self.format.unwrap_or_else(|| {
            let defaults = DownloadConfig::default();
            if self.audio_only {
                defaults.default_audio_format
            } else {
                defaults.default_video_format
            }
        })
    }

    /// Whether a cover image is fetched for video outputs
    pub fn download_cover(&self) -> bool {
        self.resolved(|o| o.download_cover, |c| c.download_cover)
    }

    /// Effective retry budget
    pub fn max_retries(&self) -> u32 {
        self.resolved(|o| o.max_retries, |c| c.max_retries)
    }

    fn resolved<T>(&self, field: impl Fn(&Self) -> Option<T>, default: impl Fn(&DownloadConfig) -> T) -> T {
        field(self).unwrap_or_else(|| default(&DownloadConfig::default()))
    }
}

/// Point-in-time view of a task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task ID
    pub id: TaskId,
    /// Item title
    pub title: String,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Progress percentage (0.0 to 100.0)
    pub progress: f32,
    /// Bytes written so far (all streams)
    pub downloaded_bytes: u64,
    /// Expected bytes (streams known so far)
    pub total_bytes: u64,
    /// Instantaneous speed in bytes per second
    pub speed_bps: u64,
    /// Estimated seconds remaining (0 when unknown)
    pub eta_secs: u64,
    /// Last error message
    pub error: Option<String>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the task reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

/// Snapshot of every task known to the manager, by collection
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Running or paused tasks
    pub active: Vec<TaskSnapshot>,
    /// Waiting tasks in admission order
    pub pending: Vec<TaskSnapshot>,
    /// Completed or skipped tasks
    pub completed: Vec<TaskSnapshot>,
    /// Failed or stopped tasks
    pub failed: Vec<TaskSnapshot>,
}

/// Event emitted during task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task added to the pending queue
    Queued {
        /// Task ID
        id: TaskId,
        /// Item title
        title: String,
    },

    /// Task admitted and its worker spawned
    Started {
        /// Task ID
        id: TaskId,
    },

    /// Transfer progress update
    Progress {
        /// Task ID
        id: TaskId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Bytes written so far
        downloaded: u64,
        /// Expected bytes
        total: u64,
        /// Current speed in bytes per second
        speed_bps: u64,
        /// Estimated seconds remaining (0 when unknown)
        eta_secs: u64,
    },

    /// Task paused
    Paused {
        /// Task ID
        id: TaskId,
    },

    /// Task resumed
    Resumed {
        /// Task ID
        id: TaskId,
    },

    /// External merge/extract step started
    Merging {
        /// Task ID
        id: TaskId,
        /// Final output path
        output: PathBuf,
    },

    /// Output written
    Completed {
        /// Task ID
        id: TaskId,
        /// Final output path
        output: PathBuf,
    },

    /// Output already existed
    Skipped {
        /// Task ID
        id: TaskId,
        /// Existing output path
        output: PathBuf,
    },

    /// Task failed
    Failed {
        /// Task ID
        id: TaskId,
        /// Error message
        error: String,
    },

    /// Task stopped by the user
    Stopped {
        /// Task ID
        id: TaskId,
    },

    /// Manager shut down
    Shutdown,
}
