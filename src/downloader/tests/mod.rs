use super::test_helpers::*;
use super::*;
use crate::error::{DownloadError, Error};
use crate::types::{ItemDescriptor, OutputFormat, Part, ResolvedSource, TaskOptions, TaskStatus};
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


/// A hydrated single-part item
fn item(bvid: &str, title: &str) -> ItemDescriptor {
    let mut item = ItemDescriptor::listing_entry(bvid, title, "01:00".to_string());
    item.cid = Some(5000);
    item
}

fn options(dir: &Path) -> TaskOptions {
    TaskOptions::new(dir)
}

/// Origin serving item details, stream locators and both streams
async fn full_origin() -> MockServer {
    let server = MockServer::start().await;
    mount_playurl(&server).await;
    mount_streams(&server).await;
    server
}

/// Origin whose streams answer after `delay`
async fn slow_origin(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    mount_playurl(&server).await;
    Mock::given(method("GET"))
        .and(path(VIDEO_PATH))
        .respond_with(RangeBody::slow(video_body(), delay))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(AUDIO_PATH))
        .respond_with(RangeBody::slow(audio_body(), delay))
        .mount(&server)
        .await;
    server
}

fn muxed_body() -> Vec<u8> {
    let mut expected = video_body();
    expected.extend(audio_body());
    expected
}
