//! Drives the public API end to end against a mock origin

mod common;

use bili_dl::rename::{self, RenameRule};
use bili_dl::types::Event;
use bili_dl::{ResolvedSource, Settings, TaskOptions, TaskStatus};
use common::*;
use tempfile::tempdir;

#[tokio::test]
async fn season_downloads_every_part_and_reruns_skip() {
    let server = season_origin().await;
    let dir = tempdir().unwrap();
    let manager = manager(test_config(&server, dir.path()));
    let mut events = manager.subscribe();

    let source = manager
        .resolver()
        .resolve("https://www.bilibili.com/collection/9")
        .await
        .unwrap();
    let ResolvedSource::Collection { title, items } = &source else {
        panic!("expected a collection, got {source:?}");
    };
    assert_eq!(title, "Lectures");
    assert_eq!(items[0].duration, "01:01");
    assert_eq!(items[1].duration, "01:02:03");

    let ids = manager
        .enqueue_source(source.clone(), TaskOptions::new(dir.path()))
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);

    let finished = wait_all(&manager, &ids).await;
    assert!(finished.iter().all(|s| s.status == TaskStatus::Completed), "{finished:?}");

    let mut expected = stream_bytes(1, 30_000);
    expected.extend(stream_bytes(50, 9_000));
    for name in ["Alpha.mp4", "Beta - Part A.mp4", "Beta - Part B.mp4"] {
        assert_eq!(tokio::fs::read(dir.path().join(name)).await.unwrap(), expected, "{name}");
    }

    let completed = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, Event::Completed { .. }))
        .count();
    assert_eq!(completed, 3);

    // Same batch again: outputs exist, so nothing is fetched
    let before = server.received_requests().await.unwrap().len();
    let again = manager
        .enqueue_source(source, TaskOptions::new(dir.path()))
        .await
        .unwrap();
    let rerun = wait_all(&manager, &again).await;
    assert!(rerun.iter().all(|s| s.status == TaskStatus::Skipped));
    let streamed = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .skip(before)
        .filter(|r| r.url.path().ends_with(".m4s") || r.url.path() == "/x/player/playurl")
        .count();
    assert_eq!(streamed, 0);

    manager.shutdown().await;
}

#[tokio::test]
async fn downloaded_files_can_be_renamed_in_bulk() {
    let dir = tempdir().unwrap();
    for name in ["【Lecture】Alpha.mp4", "《Beta》 - Part A.mp4"] {
        tokio::fs::write(dir.path().join(name), b"media").await.unwrap();
    }

    let plans = rename::scan(dir.path(), &RenameRule::ExtractTitle).await.unwrap();
    let report = rename::execute(&plans).await;

    assert_eq!(report.succeeded.len(), 2);
    assert!(dir.path().join("Beta.mp4").exists());
    assert!(dir.path().join("Lecture.mp4").exists());
}

#[tokio::test]
async fn persisted_settings_shape_the_manager() {
    let server = season_origin().await;
    let dir = tempdir().unwrap();
    let settings_path = dir.path().join("settings.json");
    tokio::fs::write(
        &settings_path,
        r#"{"max_concurrent_downloads": 1, "default_video_format": "mkv"}"#,
    )
    .await
    .unwrap();

    let settings = Settings::load(&settings_path).await;
    let mut config = test_config(&server, dir.path());
    settings.apply_to(&mut config);
    assert_eq!(config.download.max_concurrent_downloads, 1);

    let manager = manager(config);
    let source = manager.resolver().resolve("BV1beta").await.unwrap();
    let ids = manager
        .enqueue_source(source, TaskOptions::new(dir.path()))
        .await
        .unwrap();

    let queue = manager.snapshot();
    assert_eq!(queue.active.len(), 1);
    assert_eq!(queue.pending.len(), 1);
    let finished = wait_all(&manager, &ids).await;
    assert!(finished.iter().all(|s| s.status == TaskStatus::Completed), "{finished:?}");
    for name in ["Beta - Part A", "Beta - Part B"] {
        assert!(dir.path().join(format!("{name}.mkv")).exists(), "{name}");
        assert!(!dir.path().join(format!("{name}.mp4")).exists(), "{name}");
    }
}
