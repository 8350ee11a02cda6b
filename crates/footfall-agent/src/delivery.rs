//! # Delivery Scheduler
//!
//! Picks a transport per event and runs every network call and timer as a
//! detached task that reports back to the tracker through [`Signal`]s.
//!
//! ## Transport Selection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Per-Event Transport Choice                         │
//! │                                                                         │
//! │  use_beacon ─┐                                                          │
//! │  no headers ─┼── all true ──► beacon: form POST, not acknowledged,     │
//! │  capability ─┤                event never enters the outbox            │
//! │  !credentials┘                                                          │
//! │                                                                         │
//! │  otherwise  ──► outbox.push(E) ──► sleep(debounce) ──► DebounceElapsed │
//! │                                       ──► POST JSON ──► 2xx ──►         │
//! │                                           EventAcknowledged(E.id)       │
//! │                                                                         │
//! │  A failed POST is logged and left in the outbox for the next           │
//! │  tracker lifetime to replay.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use footfall_core::{Event, EventEnvelope, VisitPayload};

use crate::config::TrackerConfig;
use crate::error::TrackerResult;
use crate::host::HostEnvironment;
use crate::transport::{OutboundRequest, Transport};

/// Header carrying the host's CSRF token on acknowledged requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Completion notices from detached tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// The collector accepted the session-creation call for this visit.
    VisitAcknowledged { visit_token: String },

    /// The collector accepted the delivery of this event.
    EventAcknowledged { id: String },

    /// The debounce before the first delivery attempt has passed.
    DebounceElapsed(Event),
}

/// Issues requests and timers on behalf of the tracker.
#[derive(Clone)]
pub struct DeliveryScheduler {
    transport: Arc<dyn Transport>,
    signals: mpsc::UnboundedSender<Signal>,
}

impl DeliveryScheduler {
    pub fn new(transport: Arc<dyn Transport>, signals: mpsc::UnboundedSender<Signal>) -> Self {
        DeliveryScheduler { transport, signals }
    }

    /// Whether the fire-and-forget path may be used for the next event.
    pub fn can_send_now(&self, config: &TrackerConfig) -> bool {
        config.tracking.use_beacon
            && config.endpoint.headers.is_empty()
            && self.transport.supports_beacon()
            && !config.endpoint.with_credentials
    }

    /// Hands an event to the beacon primitive.
    pub fn send_now(
        &self,
        config: &TrackerConfig,
        host: &dyn HostEnvironment,
        event: &Event,
    ) -> TrackerResult<bool> {
        let envelope = EventEnvelope::for_event(event, config.storage.enabled);

        let param = host.csrf_param();
        let token = host.csrf_token();
        let csrf = match (&param, &token) {
            (Some(param), Some(token)) => Some((param.as_str(), token.as_str())),
            _ => None,
        };

        let fields = envelope.to_form_fields(csrf)?;
        Ok(self
            .transport
            .send_beacon(&config.endpoint.events_endpoint(), fields))
    }

    /// Starts the debounce timer for an event already in the outbox.
    pub fn debounce(&self, delay: Duration, event: Event) {
        let signals = self.signals.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = signals.send(Signal::DebounceElapsed(event));
        });
    }

    /// POSTs an event and reports its acknowledgment.
    pub fn deliver(
        &self,
        config: &TrackerConfig,
        host: &dyn HostEnvironment,
        event: &Event,
    ) -> TrackerResult<()> {
        let envelope = EventEnvelope::for_event(event, config.storage.enabled);
        let body = serde_json::to_value(&envelope)?;
        let request = Self::request(config, host, config.endpoint.events_endpoint());

        let transport = self.transport.clone();
        let signals = self.signals.clone();
        let id = event.id.clone();
        let name = event.name.clone();

        tokio::spawn(async move {
            match transport.post_json(&request, &body).await {
                Ok(()) => {
                    let _ = signals.send(Signal::EventAcknowledged { id });
                }
                Err(e) if e.is_retryable() => {
                    warn!(event = %name, id = %id, error = %e, "Event delivery failed; kept for replay")
                }
                Err(e) => error!(event = %name, id = %id, error = %e, "Event rejected"),
            }
        });
        Ok(())
    }

    /// POSTs the session-creation payload and reports its acknowledgment.
    pub fn create_visit(
        &self,
        config: &TrackerConfig,
        host: &dyn HostEnvironment,
        payload: &VisitPayload,
    ) -> TrackerResult<()> {
        let body: Value = payload.to_body()?;
        let request = Self::request(config, host, config.endpoint.visits_endpoint());

        let transport = self.transport.clone();
        let signals = self.signals.clone();
        let visit_token = payload.visit_token.clone();

        tokio::spawn(async move {
            match transport.post_json(&request, &body).await {
                Ok(()) => {
                    debug!(visit = %visit_token, "Visit acknowledged");
                    let _ = signals.send(Signal::VisitAcknowledged { visit_token });
                }
                Err(e) => error!(error = %e, "Visit creation failed; tracking paused"),
            }
        });
        Ok(())
    }

    fn request(config: &TrackerConfig, host: &dyn HostEnvironment, url: String) -> OutboundRequest {
        let mut request = OutboundRequest::new(url);
        request.with_credentials = config.endpoint.with_credentials;

        for (name, value) in &config.endpoint.headers {
            request.headers.push((name.clone(), value.clone()));
        }
        if let Some(token) = host.csrf_token() {
            request.headers.push((CSRF_HEADER.to_string(), token));
        }
        request
    }
}
