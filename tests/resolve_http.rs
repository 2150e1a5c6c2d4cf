//! Resolver and gallery behaviour against a mocked upstream.

use std::sync::Arc;
use std::time::Duration;

use gallery::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn structured(id: &str, server: &MockServer, route: &str, json_path: &str) -> SourceDescriptor {
    SourceDescriptor::structured(
        id,
        id,
        format!("{}{}", server.uri(), route),
        ExtractionPath::parse(json_path).unwrap(),
    )
}

fn resolver(timeout: Duration) -> Arc<Resolver> {
    Arc::new(Resolver::http(timeout).unwrap())
}

#[tokio::test]
async fn structured_source_resolves_nested_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wl/word/bing/tu"))
        .and(header("cache-control", "no-cache"))
        .and(header("pragma", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "msg": "ok",
            "data": {"pc_url": "https://cn.bing.com/th?id=OHR.x.jpg", "phone_url": "https://m/x.jpg"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let src = structured("wm_bing", &server, "/api/wl/word/bing/tu", "data.pc_url");
    let locator = resolver(Duration::from_secs(5)).resolve(&src).await;
    assert_eq!(locator, Ok("https://cn.bing.com/th?id=OHR.x.jpg".to_string()));
}

#[tokio::test]
async fn envelope_decides_even_on_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/meinvpic"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"code": 503, "msg": "quota exceeded"})))
        .mount(&server)
        .await;

    let src = structured("xximg_meinvpc", &server, "/api/meinvpic", "data");
    let err = resolver(Duration::from_secs(5)).resolve(&src).await.unwrap_err();
    assert_eq!(
        err,
        ResolveError::UpstreamStatus { source_id: "xximg_meinvpc".into(), message: "quota exceeded".into() }
    );
}

#[tokio::test]
async fn custom_envelope_status_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "data": {"inner": 42}})))
        .mount(&server)
        .await;

    let src = structured("pic", &server, "/pic", "data.inner").with_envelope(Envelope::new("status", "ok", "msg"));
    let err = resolver(Duration::from_secs(5)).resolve(&src).await.unwrap_err();
    assert!(matches!(err, ResolveError::Extraction { ref path, .. } if path == "data.inner"));
}

#[tokio::test]
async fn html_body_is_a_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/video/girl"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
        .mount(&server)
        .await;

    let src = structured("wm_girls", &server, "/api/video/girl", "data.video");
    let err = resolver(Duration::from_secs(5)).resolve(&src).await.unwrap_err();
    assert_eq!(err.kind(), "network");
    assert_eq!(err.source_id(), "wm_girls");
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": 200, "data": "https://late/1.png"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let src = structured("slow", &server, "/slow", "data");
    let err = resolver(Duration::from_millis(200)).resolve(&src).await.unwrap_err();
    assert!(matches!(err, ResolveError::Network { .. }), "got {err:?}");
}

#[tokio::test]
async fn raw_source_never_hits_upstream() {
    let server = MockServer::start().await;
    let src = SourceDescriptor::raw("yj", "yj", format!("{}/api/xjj.php", server.uri())).with_kind(MediaKind::Video);
    let r = resolver(Duration::from_secs(5));

    let a = r.resolve(&src).await.unwrap();
    let b = r.resolve(&src).await.unwrap();
    assert_ne!(a, b);
    assert!(a.contains("/api/xjj.php?_t="));
    assert!(a.contains("&_r="));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn rapid_switch_keeps_latest_selection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": 200, "data": "https://a/stale.png"}))
                .set_delay(Duration::from_millis(600)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "data": "https://b/fresh.png"})))
        .mount(&server)
        .await;

    let g = Gallery::new(
        vec![structured("a", &server, "/a", "data"), structured("b", &server, "/b", "data")],
        resolver(Duration::from_secs(5)),
    )
    .unwrap();

    let (a, b) = tokio::join!(g.select("a"), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        g.select("b").await
    });

    assert_eq!(a.unwrap(), Outcome::Stale);
    assert_eq!(b.unwrap(), Outcome::Applied("https://b/fresh.png".into()));
    let snap = g.snapshot();
    assert_eq!(snap.active, "b");
    assert_eq!(snap.locator.as_deref(), Some("https://b/fresh.png"));
    assert!(!snap.is_loading());
}
