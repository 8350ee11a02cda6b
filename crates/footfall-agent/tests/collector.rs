//! Tracker built from defaults, talking HTTP to a mock collector served at the
//! page origin.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use footfall_agent::{StaticHost, TrackerBuilder, TrackerConfig, TrackerError};

async fn collector() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/footfall/visits"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/footfall/events"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    server
}

/// Polls until the collector has seen `count` requests.
async fn received(server: &MockServer, count: usize) -> Vec<Request> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= count || tokio::time::Instant::now() >= deadline {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn props(value: Value) -> footfall_agent::Properties {
    match value {
        Value::Object(map) => map,
        _ => Default::default(),
    }
}

#[tokio::test]
async fn test_default_builder_reaches_collector_at_page_origin() {
    let server = collector().await;
    let tracker = TrackerBuilder::new(TrackerConfig::new())
        .with_host(Arc::new(StaticHost::new(format!("{}/pricing", server.uri()))))
        .spawn()
        .unwrap();

    assert!(tracker.track("signup", props(json!({ "plan": "pro" }))));
    let requests = received(&server, 2).await;
    assert_eq!(requests.len(), 2);

    let visit: Value = requests[0].body_json().unwrap();
    assert_eq!(requests[0].url.path(), "/footfall/visits");
    assert_eq!(visit["landing_page"], format!("{}/pricing", server.uri()));
    let visit_token = visit["visit_token"].as_str().unwrap().to_string();

    // Beacon delivery: form fields, not JSON.
    assert_eq!(requests[1].url.path(), "/footfall/events");
    let form = String::from_utf8_lossy(&requests[1].body).to_string();
    assert!(form.contains("events_json="));
    assert!(form.contains(&format!("visit_token={}", visit_token)));

    let status = tracker.status().await.unwrap();
    assert!(status.ready);
    assert_eq!(tracker.visit_id().await, Some(visit_token));
}

#[tokio::test]
async fn test_acknowledged_delivery_empties_queue() {
    let server = collector().await;
    let mut config = TrackerConfig::new();
    config.tracking.use_beacon = false;

    let tracker = TrackerBuilder::new(config)
        .with_host(Arc::new(StaticHost::new(format!("{}/pricing", server.uri()))))
        .spawn()
        .unwrap();

    tracker.track("signup", props(json!({ "plan": "pro" })));
    let requests = received(&server, 2).await;
    assert_eq!(requests.len(), 2);

    let visit: Value = requests[0].body_json().unwrap();
    let body: Value = requests[1].body_json().unwrap();
    assert_eq!(body["visit_token"], visit["visit_token"]);
    assert_eq!(body["visitor_token"], visit["visitor_token"]);
    assert_eq!(body["events"][0]["name"], "signup");
    assert_eq!(body["events"][0]["properties"], json!({ "plan": "pro" }));

    // The acknowledgment travels back through the actor.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tracker.status().await.unwrap().pending_count > 0 {
        assert!(tokio::time::Instant::now() < deadline, "event never acknowledged");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_relative_endpoints_need_a_web_origin() {
    let result = TrackerBuilder::new(TrackerConfig::new())
        .with_host(Arc::new(StaticHost::new("app://footfall/cli")))
        .spawn();
    assert!(matches!(result, Err(TrackerError::InvalidConfig(_))));

    let mut config = TrackerConfig::new();
    config.tracking.start_on_ready = false;
    config.endpoint.url_prefix = "https://collector.example.com".into();
    let tracker = TrackerBuilder::new(config)
        .with_host(Arc::new(StaticHost::new("app://footfall/cli")))
        .spawn();
    assert!(tracker.is_ok());
}
