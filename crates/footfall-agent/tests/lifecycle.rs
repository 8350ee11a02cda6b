//! Session and event lifecycle, end to end through the tracker actor.

mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use footfall_agent::interactions::StaticElement;
use footfall_agent::{
    ConfigOverrides, DisabledStorage, InteractionKind, MemoryStorage, SessionState, Storage,
    TrackerConfig,
};
use footfall_core::{EventQueue, DEBUG_KEY, EVENTS_KEY, SKIP_ATTRIBUTE, VISITOR_KEY, VISIT_KEY};

use common::{manual_config, props, settle, sorted, spawn, spawn_with_host, RecordingTransport};

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let transport = RecordingTransport::new();
    let tracker = spawn(TrackerConfig::new(), Arc::new(MemoryStorage::new()), transport.clone());

    assert!(tracker.start());
    assert!(tracker.start());
    assert!(tracker.start());
    settle().await;

    assert_eq!(transport.visits().len(), 1);

    let status = tracker.status().await.unwrap();
    assert!(status.started);
    assert!(status.ready);
    assert_eq!(status.session_state, SessionState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_tracks_share_one_session() {
    let transport = RecordingTransport::new();
    let tracker = spawn(manual_config(), Arc::new(MemoryStorage::new()), transport.clone());

    for i in 0..5 {
        assert!(tracker.track(format!("event-{}", i), props(json!({ "n": i }))));
    }
    tracker.start();
    settle().await;

    let visits = transport.visits();
    assert_eq!(visits.len(), 1);
    let visit_token = visits[0]["visit_token"].clone();
    let visitor_token = visits[0]["visitor_token"].clone();

    let posts = transport.event_posts();
    assert_eq!(posts.len(), 5);
    for (_, body) in &posts {
        assert_eq!(body["visit_token"], visit_token);
        assert_eq!(body["visitor_token"], visitor_token);
    }

    assert_eq!(
        sorted(transport.event_names()),
        vec!["event-0", "event-1", "event-2", "event-3", "event-4"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_signup_end_to_end() {
    let storage = MemoryStorage::new();
    let transport = RecordingTransport::new();
    let tracker = spawn(TrackerConfig::new(), Arc::new(storage.clone()), transport.clone());

    tracker.track("signup", props(json!({ "plan": "pro" })));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(transport.visits().len(), 1);
    assert!(transport.event_posts().is_empty());

    tokio::time::sleep(Duration::from_millis(1000)).await;
    let posts = transport.event_posts();
    assert_eq!(posts.len(), 1);

    let visit = &transport.visits()[0];
    assert_eq!(visit["platform"], "Web");
    assert_eq!(visit["landing_page"], "https://shop.example.com/pricing?plan=pro");
    assert_eq!(visit["referrer"], "https://search.example.com/");
    assert_eq!(visit["screen_width"], 1440);
    assert_eq!(visit["js"], true);

    let (request, body) = &posts[0];
    assert_eq!(request.url, "/footfall/events");
    assert_eq!(body["visit_token"], visit["visit_token"]);
    assert_eq!(body["visitor_token"], visit["visitor_token"]);

    let event = &body["events"][0];
    assert_eq!(event["name"], "signup");
    assert_eq!(event["properties"], json!({ "plan": "pro" }));
    assert!(event.get("visit_token").is_none());

    assert!(tracker.pending_events().await.unwrap().is_empty());
    let snapshot = storage.get(EVENTS_KEY).await.unwrap();
    assert_eq!(snapshot.as_deref(), Some("[]"));
}

#[tokio::test(start_paused = true)]
async fn test_acknowledged_event_leaves_queue() {
    let storage = MemoryStorage::new();
    let transport = RecordingTransport::new();
    transport.reject_event("keep");
    let tracker = spawn(TrackerConfig::new(), Arc::new(storage.clone()), transport.clone());

    tracker.track("keep", props(json!({})));
    tracker.track("drop", props(json!({})));
    settle().await;

    let pending = tracker.pending_events().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "keep");

    let snapshot = storage.get(EVENTS_KEY).await.unwrap().unwrap();
    let persisted = EventQueue::restore(Some(&snapshot)).unwrap();
    assert_eq!(persisted.len(), 1);
    assert!(persisted.contains(&pending[0].id));
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_events_replay_next_lifetime() {
    let storage = MemoryStorage::new();

    let first = RecordingTransport::failing_events();
    let tracker = spawn(TrackerConfig::new(), Arc::new(storage.clone()), first.clone());
    tracker.track("checkout", props(json!({ "total": 42 })));
    settle().await;

    let lost = tracker.pending_events().await.unwrap();
    assert_eq!(lost.len(), 1);
    tracker.shutdown();

    let second = RecordingTransport::new();
    let tracker = spawn(TrackerConfig::new(), Arc::new(storage.clone()), second.clone());
    settle().await;

    assert!(second.visits().is_empty());
    let posts = second.event_posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].1["events"][0]["id"], json!(lost[0].id));
    assert!(posts[0].1["visit_token"].is_string());
    assert!(tracker.pending_events().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unstarted_tracker_holds_replay() {
    let storage = MemoryStorage::new();

    let first = RecordingTransport::failing_events();
    let tracker = spawn(TrackerConfig::new(), Arc::new(storage.clone()), first.clone());
    tracker.track("checkout", props(json!({})));
    settle().await;
    tracker.shutdown();

    let second = RecordingTransport::new();
    let tracker = spawn(manual_config(), Arc::new(storage.clone()), second.clone());
    settle().await;

    let status = tracker.status().await.unwrap();
    assert_eq!(status.pending_count, 1);
    assert!(!status.started);
    assert!(tracker.visit_id().await.is_some());
    assert!(tracker.debug(true).await);
    assert!(tracker.reset().await);
    settle().await;

    assert!(second.visits().is_empty());
    assert!(second.event_posts().is_empty());
    assert_eq!(tracker.visit_id().await, None);
    assert_eq!(tracker.status().await.unwrap().pending_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_visit_failure_keeps_gate_closed() {
    let storage = MemoryStorage::new();
    let failing = RecordingTransport::failing_visits();
    let tracker = spawn(TrackerConfig::new(), Arc::new(storage.clone()), failing.clone());

    tracker.track("signup", props(json!({})));
    settle().await;

    assert_eq!(failing.visits().len(), 1);
    assert!(failing.event_posts().is_empty());

    let status = tracker.status().await.unwrap();
    assert!(!status.ready);
    assert_eq!(status.session_state, SessionState::Establishing);
    tracker.shutdown();

    let first_token = failing.visits()[0]["visit_token"].clone();

    let working = RecordingTransport::new();
    let tracker = spawn(TrackerConfig::new(), Arc::new(storage.clone()), working.clone());
    tracker.track("signup", props(json!({})));
    settle().await;

    let visits = working.visits();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0]["visit_token"], first_token);
    assert_eq!(working.event_names(), vec!["signup"]);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_storage_still_delivers() {
    let transport = RecordingTransport::new();
    let tracker = spawn(TrackerConfig::new(), Arc::new(DisabledStorage), transport.clone());

    assert!(tracker.track("x", props(json!({}))));
    settle().await;

    assert!(transport.visits().is_empty());
    assert_eq!(transport.event_names(), vec!["x"]);

    let status = tracker.status().await.unwrap();
    assert!(status.ready);
    assert_eq!(status.session_state, SessionState::Disabled);
    assert_eq!(tracker.visit_id().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_storage_disabled_by_config() {
    let storage = MemoryStorage::new();
    let transport = RecordingTransport::new();
    let mut config = TrackerConfig::new();
    config.storage.enabled = false;
    let tracker = spawn(config, Arc::new(storage.clone()), transport.clone());

    tracker.track("x", props(json!({})));
    settle().await;

    assert!(transport.visits().is_empty());
    let posts = transport.event_posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.get("visit_token").is_none());
    assert!(posts[0].1.get("visitor_token").is_none());
    assert!(storage.names().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reset_starts_a_new_visit() {
    let storage = MemoryStorage::new();
    let transport = RecordingTransport::new();
    let tracker = spawn(TrackerConfig::new(), Arc::new(storage.clone()), transport.clone());

    tracker.track("first", props(json!({})));
    settle().await;
    let visit = tracker.visit_id().await.unwrap();
    assert_eq!(tracker.visitor_token().await, tracker.visitor_id().await);

    assert!(tracker.reset().await);
    assert_eq!(tracker.visit_id().await, None);
    assert_eq!(tracker.visitor_id().await, None);
    let names = storage.names().await;
    assert!(!names.contains(&VISIT_KEY.to_string()));
    assert!(!names.contains(&VISITOR_KEY.to_string()));
    assert!(!names.contains(&EVENTS_KEY.to_string()));

    tracker.track("second", props(json!({})));
    settle().await;

    let visits = transport.visits();
    assert_eq!(visits.len(), 2);
    assert_ne!(visits[1]["visit_token"], json!(visit));
    assert_eq!(tracker.visit_id().await, visits[1]["visit_token"].as_str().map(str::to_string));
}

#[tokio::test(start_paused = true)]
async fn test_reset_during_establishment_ignores_old_acknowledgment() {
    let transport = RecordingTransport::new();
    transport.delay_visits([Duration::from_secs(1), Duration::from_secs(3)]);
    let tracker = spawn(TrackerConfig::new(), Arc::new(MemoryStorage::new()), transport.clone());

    tracker.track("parked", props(json!({})));
    assert!(tracker.reset().await);

    // The first visit is answered at 1s, the replacement at 3s.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let visits = transport.visits();
    assert_eq!(visits.len(), 2);
    assert_ne!(visits[0]["visit_token"], visits[1]["visit_token"]);

    let status = tracker.status().await.unwrap();
    assert!(!status.ready);
    assert_eq!(status.session_state, SessionState::Establishing);
    assert!(transport.event_posts().is_empty());

    settle().await;

    let status = tracker.status().await.unwrap();
    assert!(status.ready);
    assert_eq!(status.session_state, SessionState::Active);
    assert_eq!(
        tracker.visit_id().await,
        visits[1]["visit_token"].as_str().map(str::to_string)
    );

    let posts = transport.event_posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].1["events"][0]["name"], "parked");
    assert_eq!(posts[0].1["visit_token"], visits[1]["visit_token"]);
}

#[tokio::test(start_paused = true)]
async fn test_debug_flag_is_persisted() {
    let storage = MemoryStorage::new();
    let tracker = spawn(TrackerConfig::new(), Arc::new(storage.clone()), RecordingTransport::new());

    assert!(tracker.debug(true).await);
    assert_eq!(storage.get(DEBUG_KEY).await.unwrap().as_deref(), Some("t"));
    assert!(tracker.status().await.unwrap().debug);

    assert!(tracker.debug(false).await);
    assert_eq!(storage.get(DEBUG_KEY).await.unwrap(), None);
    assert!(!tracker.status().await.unwrap().debug);
}

#[tokio::test(start_paused = true)]
async fn test_track_view_properties() {
    let transport = RecordingTransport::new();
    let tracker = spawn(TrackerConfig::new(), Arc::new(MemoryStorage::new()), transport.clone());

    tracker.track_view(None);
    tracker.track_view(Some(props(json!({ "page": "/custom", "variant": "b" }))));
    settle().await;

    let posts = transport.event_posts();
    assert_eq!(posts.len(), 2);

    let (plain, extra): (Vec<_>, Vec<_>) = posts
        .iter()
        .map(|(_, body)| body["events"][0].clone())
        .partition(|event| event["properties"].get("variant").is_none());

    let plain = &plain[0];
    assert_eq!(plain["name"], "$view");
    assert_eq!(
        plain["properties"],
        json!({
            "url": "https://shop.example.com/pricing?plan=pro",
            "title": "Pricing",
            "page": "/pricing"
        })
    );

    let extra = &extra[0]["properties"];
    assert_eq!(extra["page"], "/custom");
    assert_eq!(extra["variant"], "b");
}

#[tokio::test(start_paused = true)]
async fn test_click_bindings() {
    let transport = RecordingTransport::new();
    let tracker = spawn(TrackerConfig::new(), Arc::new(MemoryStorage::new()), transport.clone());

    tracker.track_clicks(".cta").unwrap();
    assert!(tracker.track_clicks("   ").unwrap_err().is_config_error());

    let button = Arc::new(
        StaticElement::new("a")
            .with_class("cta")
            .with_text("Start  trial")
            .with_href("/trial"),
    );
    let icon = StaticElement::new("span").with_parent(button);
    tracker.handle_interaction(InteractionKind::Click, Arc::new(icon));

    let skipped_zone = Arc::new(StaticElement::new("nav").with_attribute(SKIP_ATTRIBUTE, "true"));
    let hidden = StaticElement::new("a").with_class("cta").with_parent(skipped_zone);
    tracker.handle_interaction(InteractionKind::Click, Arc::new(hidden));

    tracker.handle_interaction(
        InteractionKind::Submit,
        Arc::new(StaticElement::new("form").with_class("cta")),
    );
    settle().await;

    let posts = transport.event_posts();
    assert_eq!(posts.len(), 1);
    let event = &posts[0].1["events"][0];
    assert_eq!(event["name"], "$click");
    assert_eq!(event["properties"]["tag"], "a");
    assert_eq!(event["properties"]["text"], "Start trial");
    assert_eq!(event["properties"]["href"], "/trial");
    assert_eq!(event["properties"]["page"], "/pricing");
}

#[tokio::test(start_paused = true)]
#[allow(deprecated)]
async fn test_submit_and_change_bindings() {
    let transport = RecordingTransport::new();
    let tracker = spawn(TrackerConfig::new(), Arc::new(MemoryStorage::new()), transport.clone());

    tracker.track_submits("form").unwrap();
    tracker.track_changes("input").unwrap();

    tracker.handle_interaction(
        InteractionKind::Submit,
        Arc::new(StaticElement::new("form").with_id("signup")),
    );
    tracker.handle_interaction(
        InteractionKind::Change,
        Arc::new(StaticElement::new("input").with_value("secret")),
    );
    settle().await;

    assert_eq!(sorted(transport.event_names()), vec!["$change", "$submit"]);
    let change = transport
        .event_posts()
        .into_iter()
        .map(|(_, body)| body["events"][0].clone())
        .find(|event| event["name"] == "$change")
        .unwrap();
    assert_eq!(change["properties"]["tag"], "input");
    assert!(change["properties"].get("text").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_beacon_path_skips_the_queue() {
    let storage = MemoryStorage::new();
    let transport = RecordingTransport::with_beacon();
    let tracker = spawn_with_host(
        TrackerConfig::new(),
        Arc::new(storage.clone()),
        transport.clone(),
        common::host().with_csrf("authenticity_token", "csrf-123"),
    );

    tracker.track("signup", props(json!({ "plan": "pro" })));
    settle().await;

    assert!(transport.event_posts().is_empty());
    let beacons = transport.beacons();
    assert_eq!(beacons.len(), 1);

    let (url, fields) = &beacons[0];
    assert_eq!(url, "/footfall/events");
    assert!(fields.contains(&("authenticity_token".to_string(), "csrf-123".to_string())));
    assert!(fields.iter().any(|(name, _)| name == "visit_token"));

    let events_json = fields
        .iter()
        .find(|(name, _)| name == "events_json")
        .map(|(_, value)| value.clone())
        .unwrap();
    let events: serde_json::Value = serde_json::from_str(&events_json).unwrap();
    assert_eq!(events[0]["name"], "signup");

    assert!(tracker.pending_events().await.unwrap().is_empty());
    assert_eq!(storage.get(EVENTS_KEY).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_custom_headers_force_acknowledged_delivery() {
    let transport = RecordingTransport::with_beacon();
    let mut config = TrackerConfig::new();
    config
        .endpoint
        .headers
        .insert("Authorization".into(), "Bearer abc".into());
    let tracker = spawn(config, Arc::new(MemoryStorage::new()), transport.clone());

    tracker.track("signup", props(json!({})));
    settle().await;

    assert!(transport.beacons().is_empty());
    let posts = transport.event_posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0]
        .0
        .headers
        .contains(&("Authorization".to_string(), "Bearer abc".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_configure_replaces_snapshot() {
    let transport = RecordingTransport::new();
    let tracker = spawn(manual_config(), Arc::new(MemoryStorage::new()), transport.clone());

    tracker
        .configure(ConfigOverrides {
            platform: Some("iOS".into()),
            url_prefix: Some("https://collector.example.com".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let err = tracker
        .configure(ConfigOverrides {
            visits_url: Some("visits".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_config_error());

    tracker.start();
    settle().await;

    let visits = transport.visits();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0]["platform"], "iOS");
}

#[tokio::test(start_paused = true)]
async fn test_tracking_waits_for_start() {
    let transport = RecordingTransport::new();
    let tracker = spawn(manual_config(), Arc::new(MemoryStorage::new()), transport.clone());

    tracker.track("early", props(json!({})));
    settle().await;

    assert!(transport.visits().is_empty());
    assert!(transport.event_posts().is_empty());
    assert!(!tracker.status().await.unwrap().started);

    tracker.start();
    settle().await;
    assert_eq!(transport.event_names(), vec!["early"]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_tracker() {
    let tracker = spawn(TrackerConfig::new(), Arc::new(MemoryStorage::new()), RecordingTransport::new());
    let other = tracker.clone();

    tracker.shutdown();
    settle().await;

    assert!(!other.track("late", props(json!({}))));
    assert!(other.status().await.is_err());
}
