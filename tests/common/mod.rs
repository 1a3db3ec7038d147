//! Common test utilities for bili-dl integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bili_dl::config::ApiConfig;
use bili_dl::{
    Config, DownloadManager, MediaProcessor, OutputFormat, RateLimitedClient, TaskId, TaskSnapshot,
};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Writes the concatenation of its inputs, like a lossless mux
pub struct ConcatProcessor;

#[async_trait]
impl MediaProcessor for ConcatProcessor {
    async fn is_available(&self) -> bool {
        true
    }

    async fn extract_audio(&self, input: &Path, output: &Path, _format: OutputFormat) -> bili_dl::Result<()> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> bili_dl::Result<()> {
        let mut joined = tokio::fs::read(video).await?;
        joined.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, joined).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "concat"
    }
}

/// Stream body with `Range: bytes=N-` support
pub struct Ranged(pub Vec<u8>);

impl Respond for Ranged {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let offset = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.trim_end_matches('-').parse::<usize>().ok())
            .unwrap_or(0);
        if offset >= self.0.len() && offset > 0 {
            return ResponseTemplate::new(416);
        }
        let status = if offset > 0 { 206 } else { 200 };
        ResponseTemplate::new(status).set_body_bytes(self.0[offset..].to_vec())
    }
}

pub fn envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "0", "data": data}))
}

pub fn stream_bytes(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add((i % 97) as u8)).collect()
}

/// Mock origin: one season of two items, the second with two parts
pub async fn season_origin() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/x/polymer/space/seasons_archives_list"))
        .and(query_param("mid", "9"))
        .respond_with(envelope(json!({
            "meta": {"name": "Lectures"},
            "archives": [
                {"bvid": "BV1alpha", "title": "Alpha", "duration": 61},
                {"bvid": "BV1beta", "title": "Beta", "duration": "1:02:03"}
            ]
        })))
        .mount(&server)
        .await;

    for (bvid, title, pages) in [
        ("BV1alpha", "Alpha", vec![(11u64, "Alpha")]),
        ("BV1beta", "Beta", vec![(21, "Part A"), (22, "Part B")]),
    ] {
        let pages: Vec<Value> = pages
            .iter()
            .enumerate()
            .map(|(i, (cid, part))| json!({"cid": cid, "page": i + 1, "part": part, "duration": 30}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/x/web-interface/view"))
            .and(query_param("bvid", bvid))
            .respond_with(envelope(json!({
                "bvid": bvid,
                "aid": 1,
                "title": title,
                "owner": {"mid": 5, "name": "lecturer"},
                "duration": 60,
                "cid": pages[0]["cid"],
                "pages": pages,
            })))
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/x/player/playurl"))
        .respond_with(envelope(json!({"dash": {
            "video": [{"id": 80, "baseUrl": format!("{}/v.m4s", server.uri())}],
            "audio": [{"id": 30280, "baseUrl": format!("{}/a.m4s", server.uri())}],
        }})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v.m4s"))
        .respond_with(Ranged(stream_bytes(1, 30_000)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.m4s"))
        .respond_with(Ranged(stream_bytes(50, 9_000)))
        .mount(&server)
        .await;

    server
}

pub fn test_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.api = ApiConfig {
        base_url: server.uri(),
        request_delay: Duration::from_millis(5),
        backoff_step: Duration::from_millis(10),
        ..ApiConfig::default()
    };
    config.download.download_dir = dir.to_path_buf();
    config.download.max_concurrent_downloads = 2;
    config.download.download_cover = false;
    config.download.progress_interval = Duration::from_millis(10);
    config
}

pub fn manager(config: Config) -> DownloadManager {
    let client = RateLimitedClient::new(config.api.clone()).unwrap();
    DownloadManager::with_components(config, client, Arc::new(ConcatProcessor))
}

/// Wait until every task is recorded as finished by the scheduler
pub async fn wait_all(manager: &DownloadManager, ids: &[TaskId]) -> Vec<TaskSnapshot> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let queue = manager.snapshot();
        let done: Vec<_> = ids
            .iter()
            .filter_map(|id| {
                queue
                    .completed
                    .iter()
                    .chain(queue.failed.iter())
                    .find(|s| s.id == *id)
                    .cloned()
            })
            .collect();
        if done.len() == ids.len() {
            return done;
        }
        assert!(tokio::time::Instant::now() < deadline, "tasks did not finish: {queue:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
