use super::*;
use crate::config::ApiConfig;
use crate::session::Session;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "0", "data": data}))
}

fn fail(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": code, "message": message, "data": null}))
}

fn resolver_for(server: &MockServer) -> MediaSourceResolver {
    let config = ApiConfig {
        base_url: server.uri(),
        request_delay: Duration::ZERO,
        backoff_step: Duration::from_millis(10),
        max_retries: 2,
        ..ApiConfig::default()
    };
    MediaSourceResolver::new(RateLimitedClient::new(config).unwrap())
}

fn three_part_view() -> Value {
    json!({
        "bvid": "BV1three",
        "aid": 300,
        "title": "Course",
        "desc": "three parts",
        "owner": {"mid": 42, "name": "lecturer"},
        "duration": 3725,
        "pubdate": 1700000000,
        "pic": "https://i0.hdslb.com/cover.jpg",
        "cid": 1001,
        "pages": [
            {"cid": 1001, "page": 1, "part": "One", "duration": 125},
            {"cid": 1002, "page": 2, "part": "Two", "duration": 1800},
            {"cid": 1003, "page": 3, "part": "Three", "duration": 1800}
        ]
    })
}

#[tokio::test]
async fn multi_part_item_resolves_with_all_parts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .and(query_param("bvid", "BV1three"))
        .respond_with(ok(three_part_view()))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = resolver_for(&server);
    let source = resolver
        .resolve("https://www.bilibili.com/video/BV1three/?p=1")
        .await
        .unwrap();

    let ResolvedSource::SingleItem(item) = source else {
        panic!("expected a single item");
    };
    assert_eq!(item.title, "Course");
    assert_eq!(item.duration, "01:02:05");
    assert_eq!(item.parts.len(), 3, "parts are carried, not expanded");

    let parts = item.expand_parts();
    assert_eq!(parts.len(), 3);
    let mut cids: Vec<_> = parts.iter().map(|p| p.cid.unwrap()).collect();
    cids.dedup();
    assert_eq!(cids, vec![1001, 1002, 1003]);
    assert!(parts.iter().all(|p| p.author.as_deref() == Some("lecturer")));
    assert!(parts.iter().all(|p| p.parent_title.as_deref() == Some("Course")));
    assert_eq!(parts[0].duration, "02:05");
}

#[tokio::test]
async fn aid_reference_queries_by_aid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .and(query_param("aid", "300"))
        .respond_with(ok(three_part_view()))
        .expect(1)
        .mount(&server)
        .await;

    let source = resolver_for(&server).resolve("av300").await.unwrap();
    assert!(matches!(source, ResolvedSource::SingleItem(ref item) if item.bvid == "BV1three"));
}

#[tokio::test]
async fn missing_item_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .respond_with(fail(-404, "啥都木有"))
        .expect(1)
        .mount(&server)
        .await;

    let err = resolver_for(&server).resolve("BV1gone").await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn unrecognized_reference_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ok(json!({}))).expect(0).mount(&server).await;

    let err = resolver_for(&server).resolve("https://example.org/nothing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn season_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/polymer/space/seasons_archives_list"))
        .and(query_param("mid", "555"))
        .and(query_param("page_size", "30"))
        .respond_with(ok(json!({
            "archives": [
                {"bvid": "BV1s1", "title": "S1", "duration": 61},
                {"bvid": "BV1s2", "title": "S2", "duration": 3600}
            ],
            "meta": {"name": "Season One"}
        })))
        .mount(&server)
        .await;

    let source = resolver_for(&server)
        .resolve("https://www.bilibili.com/collection/555")
        .await
        .unwrap();
    match source {
        ResolvedSource::Collection { title, items } => {
            assert_eq!(title, "Season One");
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].duration, "01:01");
            assert_eq!(items[1].duration, "01:00:00");
            assert!(items.iter().all(|i| i.cid.is_none()));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn medialist_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/polymer/web-space/medialist"))
        .and(query_param("mid", "9"))
        .respond_with(ok(json!({
            "list": {
                "ves": [{"bvid": "BV1m1", "title": "M1", "duration": 10}],
                "info": {"title": "Favourites"}
            }
        })))
        .mount(&server)
        .await;

    let (title, items) = resolver_for(&server).collection(CollectionKind::MediaList, 9).await.unwrap();
    assert_eq!(title, "Favourites");
    assert_eq!(items[0].bvid, "BV1m1");
}

#[tokio::test]
async fn series_and_list_share_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/series/series"))
        .respond_with(ok(json!({
            "archives": [{"bvid": "BV1r1", "title": "R1", "duration": "4:05"}],
            "meta": {}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let resolver = resolver_for(&server);
    let (title, items) = resolver.collection(CollectionKind::Series, 7).await.unwrap();
    assert_eq!(title, "Untitled collection");
    assert_eq!(items[0].duration, "04:05");
    let (_, items) = resolver.collection(CollectionKind::List, 7).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn opus_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/space/opus/detail"))
        .and(query_param("opus_id", "123456"))
        .respond_with(ok(json!({
            "summary": {"title": "Weekly picks"},
            "list": [{"modules": [
                {"module_type": "module_dynamic", "major": {"archive": {"bvid": "BV1o1", "title": "O1", "duration_text": "12:00"}}}
            ]}]
        })))
        .mount(&server)
        .await;

    let source = resolver_for(&server)
        .resolve("https://www.bilibili.com/opus/123456")
        .await
        .unwrap();
    match source {
        ResolvedSource::Collection { title, items } => {
            assert_eq!(title, "Weekly picks");
            assert_eq!(items[0].duration, "12:00");
        }
        other => panic!("unexpected {other:?}"),
    }
}

fn space_page(prefix: &str, count: usize) -> Value {
    let vlist: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "bvid": format!("BV1{prefix}{i}"),
                "aid": i,
                "title": format!("{prefix} {i}"),
                "author": "uploader",
                "mid": 77,
                "length": "03:00",
                "created": 1700000000 + i as i64
            })
        })
        .collect();
    json!({"list": {"vlist": vlist}})
}

#[tokio::test]
async fn space_pagination_stops_at_empty_page() {
    let server = MockServer::start().await;
    for (pn, body) in [("1", space_page("a", 2)), ("2", space_page("b", 1)), ("3", space_page("c", 0))] {
        Mock::given(method("GET"))
            .and(path("/x/space/arc/search"))
            .and(query_param("mid", "77"))
            .and(query_param("pn", pn))
            .respond_with(ok(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let source = resolver_for(&server)
        .resolve("https://space.bilibili.com/77/video")
        .await
        .unwrap();
    match source {
        ResolvedSource::Collection { title, items } => {
            assert_eq!(title, "uploader");
            let ids: Vec<_> = items.iter().map(|i| i.bvid.as_str()).collect();
            assert_eq!(ids, ["BV1a0", "BV1a1", "BV1b0"]);
            assert!(items.iter().all(|i| i.cid.is_none()), "listing aids are not content ids");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn space_pagination_keeps_partial_results_on_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/space/arc/search"))
        .and(query_param("pn", "1"))
        .respond_with(ok(space_page("a", 3)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/space/arc/search"))
        .and(query_param("pn", "2"))
        .respond_with(fail(-352, "risk control"))
        .mount(&server)
        .await;

    let items = resolver_for(&server).space_items(77).await.unwrap();
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn space_first_page_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/space/arc/search"))
        .respond_with(fail(-352, "risk control"))
        .mount(&server)
        .await;

    let result = resolver_for(&server).space_items(77).await;
    assert!(matches!(result, Err(Error::Api { code: -352, .. })));
}

fn playurl(videos: &[(u32, &str)]) -> Value {
    let video: Vec<Value> = videos
        .iter()
        .map(|(id, url)| json!({"id": id, "baseUrl": url, "base_url": url}))
        .collect();
    json!({"dash": {"video": video, "audio": [{"id": 30280, "baseUrl": "https://cdn/audio"}, {"id": 30216, "baseUrl": "https://cdn/audio-low"}]}})
}

#[tokio::test]
async fn streams_prefer_requested_quality() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/player/playurl"))
        .and(query_param("qn", "64"))
        .and(query_param("cid", "1002"))
        .and(query_param("fnval", "16"))
        .respond_with(ok(playurl(&[(80, "https://cdn/v80"), (64, "https://cdn/v64")])))
        .mount(&server)
        .await;

    let streams = resolver_for(&server)
        .resolve_streams("BV1three", 1002, Quality::Q720)
        .await
        .unwrap();
    assert_eq!(streams.video_url, "https://cdn/v64");
    assert_eq!(streams.audio_url, "https://cdn/audio");
    assert_eq!(streams.quality_code, 64);
}

#[tokio::test]
async fn streams_fall_back_to_first_video() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/player/playurl"))
        .respond_with(ok(playurl(&[(32, "https://cdn/v32"), (16, "https://cdn/v16")])))
        .mount(&server)
        .await;

    let streams = resolver_for(&server)
        .resolve_streams("BV1three", 1001, Quality::Q1080)
        .await
        .unwrap();
    assert_eq!(streams.video_url, "https://cdn/v32");
    assert_eq!(streams.quality_code, 32);
}

#[tokio::test]
async fn streams_without_dash_are_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/player/playurl"))
        .respond_with(ok(json!({"durl": []})))
        .mount(&server)
        .await;

    let err = resolver_for(&server)
        .resolve_streams("BV1three", 1001, Quality::Q1080)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Malformed(_)));
}

#[tokio::test]
async fn hydrate_fills_content_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .and(query_param("bvid", "BV1three"))
        .respond_with(ok(three_part_view()))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = resolver_for(&server);
    let entry = ItemDescriptor::listing_entry("BV1three", "Course", "00:00".to_string());
    let hydrated = resolver.hydrate(&entry).await.unwrap();
    assert_eq!(hydrated.cid, Some(1001));

    // Already hydrated descriptors make no request
    let again = resolver.hydrate(&hydrated).await.unwrap();
    assert_eq!(again, hydrated);
}

#[tokio::test]
async fn resolve_all_isolates_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .and(query_param("bvid", "BV1three"))
        .respond_with(ok(three_part_view()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .and(query_param("bvid", "BV1gone"))
        .respond_with(fail(62002, "invisible"))
        .mount(&server)
        .await;

    let results = resolver_for(&server)
        .resolve_all(&["BV1gone", "not a reference", "BV1three"])
        .await;
    assert_eq!(results.len(), 3);
    assert!(results[0].1.as_ref().unwrap_err().is_not_found());
    assert!(results[1].1.is_err());
    assert!(results[2].1.is_ok());
    assert_eq!(results[2].0, "BV1three");
}

#[tokio::test]
async fn current_user_requires_verified_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/space/myinfo"))
        .respond_with(ok(json!({"mid": 42, "name": "me", "level": 6})))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server);
    assert!(matches!(resolver.current_user().await, Err(Error::NotLoggedIn)));

    resolver
        .client()
        .set_session(Session::from_cookies([("SESSDATA".to_string(), "ok".to_string())]));
    assert!(resolver.client().verify_session().await.unwrap());

    let user = resolver.current_user().await.unwrap();
    assert_eq!(user.mid, 42);
    assert_eq!(user.level, Some(6));
}
