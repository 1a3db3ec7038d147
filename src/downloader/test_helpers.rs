//! Shared test helpers: a scripted media processor and a mock origin.

use crate::client::RateLimitedClient;
use crate::config::{ApiConfig, Config};
use crate::downloader::DownloadManager;
use crate::error::{Error, Result};
use crate::media::MediaProcessor;
use crate::types::{OutputFormat, TaskId, TaskSnapshot, TaskStatus};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub(crate) const VIDEO_PATH: &str = "/stream/video.m4s";
pub(crate) const AUDIO_PATH: &str = "/stream/audio.m4s";

/// How the fake processor behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeMode {
    /// Concatenate the inputs into the output
    Concatenate,
    /// Write a partial output, then fail like a crashed tool
    Fail,
    /// Report the tool as missing
    Missing,
}

/// Media processor that never spawns a process
pub(crate) struct FakeProcessor {
    mode: FakeMode,
    pub(crate) calls: AtomicU32,
}

impl FakeProcessor {
    pub(crate) fn new(mode: FakeMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicU32::new(0),
        })
    }

    async fn produce(&self, inputs: &[&Path], output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            FakeMode::Missing => Err(Error::ToolUnavailable("fake".into())),
            FakeMode::Fail => {
                tokio::fs::write(output, b"partial").await?;
                Err(Error::external_tool("fake", Some(1), b"Invalid data found when processing input\n"))
            }
            FakeMode::Concatenate => {
                let mut joined = Vec::new();
                for input in inputs {
                    joined.extend(tokio::fs::read(input).await?);
                }
                tokio::fs::write(output, joined).await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl MediaProcessor for FakeProcessor {
    async fn is_available(&self) -> bool {
        self.mode != FakeMode::Missing
    }

    async fn extract_audio(&self, input: &Path, output: &Path, _format: OutputFormat) -> Result<()> {
        self.produce(&[input], output).await
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.produce(&[video, audio], output).await
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Serves a fixed body honoring `Range: bytes=N-`
///
/// `chunk_delay` slows the body down so tests can pause or stop mid-transfer.
pub(crate) struct RangeBody {
    pub(crate) body: Vec<u8>,
    pub(crate) delay: Duration,
}

impl RangeBody {
    pub(crate) fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn slow(body: Vec<u8>, delay: Duration) -> Self {
        Self { body, delay }
    }
}

impl Respond for RangeBody {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let offset = request
            .headers
            .get("range")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("bytes="))
            .and_then(|value| value.trim_end_matches('-').parse::<usize>().ok());

        let template = match offset {
            Some(offset) if offset >= self.body.len() => return ResponseTemplate::new(416),
            Some(offset) => ResponseTemplate::new(206)
                .insert_header(
                    "content-range",
                    format!("bytes {}-{}/{}", offset, self.body.len() - 1, self.body.len()),
                )
                .set_body_bytes(self.body[offset..].to_vec()),
            None => ResponseTemplate::new(200).set_body_bytes(self.body.clone()),
        };
        template.set_delay(self.delay)
    }
}

pub(crate) fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "0", "data": data}))
}

pub(crate) fn video_body() -> Vec<u8> {
    (0..20_000u32).map(|i| (i % 251) as u8).collect()
}

pub(crate) fn audio_body() -> Vec<u8> {
    (0..5_000u32).map(|i| (i % 13) as u8 + 100).collect()
}

/// Item detail for `bvid` with one part per title in `parts`
pub(crate) async fn mount_item(server: &MockServer, bvid: &str, title: &str, parts: &[&str]) {
    let pages: Vec<Value> = parts
        .iter()
        .enumerate()
        .map(|(i, part)| json!({"cid": 5000 + i as u64, "page": i + 1, "part": part, "duration": 60}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .and(query_param("bvid", bvid))
        .respond_with(ok(json!({
            "bvid": bvid,
            "aid": 1,
            "title": title,
            "owner": {"mid": 7, "name": "uploader"},
            "duration": 60 * parts.len(),
            "pic": format!("{}/cover.jpg", server.uri()),
            "cid": 5000,
            "pages": pages,
        })))
        .mount(server)
        .await;
}

/// Stream locators pointing back at the mock server
pub(crate) async fn mount_playurl(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/x/player/playurl"))
        .respond_with(ok(json!({"dash": {
            "video": [{"id": 80, "baseUrl": format!("{}{VIDEO_PATH}", server.uri())}],
            "audio": [{"id": 30280, "baseUrl": format!("{}{AUDIO_PATH}", server.uri())}],
        }})))
        .mount(server)
        .await;
}

pub(crate) async fn mount_streams(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(VIDEO_PATH))
        .respond_with(RangeBody::new(video_body()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(AUDIO_PATH))
        .respond_with(RangeBody::new(audio_body()))
        .mount(server)
        .await;
}

/// Config pointing at `server` with fast timings
pub(crate) fn test_config(server: &MockServer, download_dir: &Path, max_concurrent: usize) -> Config {
    let mut config = Config::default();
    config.api = ApiConfig {
        base_url: server.uri(),
        request_delay: Duration::ZERO,
        backoff_step: Duration::from_millis(10),
        max_retries: 2,
        ..ApiConfig::default()
    };
    config.download.download_dir = download_dir.to_path_buf();
    config.download.max_concurrent_downloads = max_concurrent;
    config.download.download_cover = false;
    config.download.progress_interval = Duration::from_millis(10);
    config.download.pause_poll_interval = Duration::from_millis(10);
    config.download.stop_timeout = Duration::from_secs(2);
    config
}

pub(crate) fn create_test_manager(config: Config, processor: Arc<dyn MediaProcessor>) -> DownloadManager {
    let client = RateLimitedClient::new(config.api.clone()).unwrap();
    DownloadManager::with_components(config, client, processor)
}

/// Poll until the task satisfies `done`, panicking after five seconds
pub(crate) async fn wait_for(
    manager: &DownloadManager,
    id: TaskId,
    done: impl Fn(&TaskSnapshot) -> bool,
) -> TaskSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = manager.task_status(id).unwrap();
        if done(&snapshot) {
            return snapshot;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} stuck in {:?}: {:?}",
            snapshot.status,
            snapshot.error
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the task is terminal and the scheduler has recorded it
pub(crate) async fn wait_terminal(manager: &DownloadManager, id: TaskId) -> TaskSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let queue = manager.snapshot();
        let settled = queue
            .completed
            .iter()
            .chain(queue.failed.iter())
            .find(|s| s.id == id && s.status.is_terminal());
        if let Some(snapshot) = settled {
            return snapshot.clone();
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} never settled: {:?}",
            manager.task_status(id).unwrap()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub(crate) async fn wait_status(manager: &DownloadManager, id: TaskId, status: TaskStatus) -> TaskSnapshot {
    wait_for(manager, id, |s| s.status == status).await
}
