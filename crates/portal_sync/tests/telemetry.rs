mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::FakeManagerHttp;
use portal_sync::{InMemoryHost, PlayerId, PlayerRef, Position, TelemetryReporter};
use reqwest::Client;

fn reporter(base_url: String, host: Arc<InMemoryHost>) -> TelemetryReporter {
    TelemetryReporter::new(
        Client::new(),
        base_url,
        "node-1",
        Duration::from_secs(5),
        host,
    )
}

#[tokio::test]
async fn test_report_posts_block_positions() {
    let manager = FakeManagerHttp::start(200, "{}").await;
    let host = Arc::new(InMemoryHost::new());
    host.place_player(
        PlayerRef::new(PlayerId::new(), "Steve"),
        "world_nether",
        Position::new(-0.5, 32.9, 100.1),
    );
    let telemetry = reporter(manager.base_url(), host);

    assert!(telemetry.report().await);

    let requests = manager.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/api/servers/node-1/players");

    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "players": [{ "name": "Steve", "x": -1, "y": 32, "z": 100, "world": "world_nether" }]
        })
    );
    assert_eq!(telemetry.stats().sent.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_empty_server_still_reports() {
    let manager = FakeManagerHttp::start(204, "").await;
    let telemetry = reporter(manager.base_url(), Arc::new(InMemoryHost::new()));

    assert!(telemetry.report().await);
    let body: serde_json::Value =
        serde_json::from_str(&manager.requests().await[0].body).unwrap();
    assert_eq!(body, serde_json::json!({ "players": [] }));
}

#[tokio::test]
async fn test_failures_are_counted_not_raised() {
    let telemetry = reporter("http://127.0.0.1:1".to_string(), Arc::new(InMemoryHost::new()));
    assert!(!telemetry.report().await);
    assert!(!telemetry.report().await);

    let manager = FakeManagerHttp::start(503, "").await;
    let rejected = reporter(manager.base_url(), Arc::new(InMemoryHost::new()));
    assert!(!rejected.report().await);

    assert_eq!(telemetry.stats().failed.load(Ordering::Relaxed), 2);
    assert_eq!(rejected.stats().failed.load(Ordering::Relaxed), 1);
    assert_eq!(rejected.stats().sent.load(Ordering::Relaxed), 0);
}
