//! Shared fixtures for the tracker lifecycle tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use footfall_agent::{
    OutboundRequest, Properties, StaticHost, Storage, TrackerBuilder, TrackerConfig,
    TrackerError, TrackerHandle, TrackerResult, Transport,
};

/// Transport that records every request and answers from flags.
#[derive(Default)]
pub struct RecordingTransport {
    pub beacon: bool,
    pub fail_visits: AtomicBool,
    pub fail_events: AtomicBool,
    rejected_names: Mutex<HashSet<String>>,
    visit_delays: Mutex<VecDeque<Duration>>,
    posts: Mutex<Vec<(OutboundRequest, Value)>>,
    beacons: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_beacon() -> Arc<Self> {
        Arc::new(RecordingTransport {
            beacon: true,
            ..Default::default()
        })
    }

    pub fn failing_visits() -> Arc<Self> {
        let transport = Self::default();
        transport.fail_visits.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    pub fn failing_events() -> Arc<Self> {
        let transport = Self::default();
        transport.fail_events.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    /// Answers 422 for deliveries of events with this name.
    pub fn reject_event(&self, name: &str) {
        self.rejected_names.lock().unwrap().insert(name.to_string());
    }

    /// Holds the answer to each successive session-creation call for the
    /// given time.
    pub fn delay_visits(&self, delays: impl IntoIterator<Item = Duration>) {
        self.visit_delays.lock().unwrap().extend(delays);
    }

    /// Session-creation bodies, in send order.
    pub fn visits(&self) -> Vec<Value> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(request, _)| request.url.ends_with("/visits"))
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Acknowledged event deliveries, in send order.
    pub fn event_posts(&self) -> Vec<(OutboundRequest, Value)> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(request, _)| request.url.ends_with("/events"))
            .cloned()
            .collect()
    }

    /// Names of every delivered event, across all acknowledged posts.
    pub fn event_names(&self) -> Vec<String> {
        self.event_posts()
            .iter()
            .flat_map(|(_, body)| body["events"].as_array().cloned().unwrap_or_default())
            .filter_map(|event| event["name"].as_str().map(str::to_string))
            .collect()
    }

    pub fn beacons(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.beacons.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_json(&self, request: &OutboundRequest, body: &Value) -> TrackerResult<()> {
        self.posts
            .lock()
            .unwrap()
            .push((request.clone(), body.clone()));

        if request.url.ends_with("/visits") {
            let delay = self.visit_delays.lock().unwrap().pop_front();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_visits.load(Ordering::SeqCst) {
                return Err(TrackerError::RequestFailed("connection refused".into()));
            }
        }

        if request.url.ends_with("/events") {
            if self.fail_events.load(Ordering::SeqCst) {
                return Err(TrackerError::RequestFailed("connection refused".into()));
            }
            let rejected = self.rejected_names.lock().unwrap();
            let names = body["events"].as_array().cloned().unwrap_or_default();
            if names
                .iter()
                .any(|e| e["name"].as_str().map(|n| rejected.contains(n)).unwrap_or(false))
            {
                return Err(TrackerError::Rejected { status: 422 });
            }
        }

        Ok(())
    }

    fn supports_beacon(&self) -> bool {
        self.beacon
    }

    fn send_beacon(&self, url: &str, fields: Vec<(String, String)>) -> bool {
        self.beacons.lock().unwrap().push((url.to_string(), fields));
        true
    }
}

pub fn host() -> StaticHost {
    StaticHost::new("https://shop.example.com/pricing?plan=pro")
        .with_title("Pricing")
        .with_referrer("https://search.example.com/")
        .with_screen(1440, 900)
}

/// Config that waits for an explicit `start`.
pub fn manual_config() -> TrackerConfig {
    let mut config = TrackerConfig::new();
    config.tracking.start_on_ready = false;
    config
}

pub fn spawn(
    config: TrackerConfig,
    storage: Arc<dyn Storage>,
    transport: Arc<RecordingTransport>,
) -> TrackerHandle {
    spawn_with_host(config, storage, transport, host())
}

pub fn spawn_with_host(
    config: TrackerConfig,
    storage: Arc<dyn Storage>,
    transport: Arc<RecordingTransport>,
    host: StaticHost,
) -> TrackerHandle {
    TrackerBuilder::new(config)
        .with_storage(storage)
        .with_transport(transport)
        .with_host(Arc::new(host))
        .spawn()
        .unwrap()
}

/// Lets timers fire and the actor go idle (the clock is paused).
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

/// Delivery order across debounce timers is not defined.
pub fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

pub fn props(value: Value) -> Properties {
    match value {
        Value::Object(map) => map,
        _ => Properties::new(),
    }
}
