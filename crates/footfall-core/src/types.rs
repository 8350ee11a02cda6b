//! # Domain Types
//!
//! Events and the payloads that carry them to the collector.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Event       │   │  EventEnvelope  │   │  VisitPayload   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │──►│  events [1]     │   │  visit_token    │       │
//! │  │  name           │   │  visit_token?   │   │  visitor_token  │       │
//! │  │  properties     │   │  visitor_token? │   │  platform       │       │
//! │  │  time (secs)    │   └────────┬────────┘   │  landing_page   │       │
//! │  │  visit_token?   │            │            │  screen w/h     │       │
//! │  │  visitor_token? │            ▼            │  referrer?      │       │
//! │  └─────────────────┘   JSON body or form     │  ...params      │       │
//! │                        (events_json field)   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Token Placement
//! An event captures its visit/visitor tokens once the session is ready. When
//! it is wrapped in an [`EventEnvelope`] the tokens move from the event to the
//! envelope, so the collector sees them exactly once per request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreResult;

/// Arbitrary event properties (string keys, JSON scalar values).
pub type Properties = serde_json::Map<String, Value>;

/// Generates a fresh opaque identifier.
///
/// Used for visit tokens, visitor tokens and event ids alike. UUID v4 carries
/// 122 random bits, so collisions are not a practical concern and "first
/// matching id" is "the matching id".
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

/// Returns the string if it is non-empty.
pub fn presence(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn default_js() -> bool {
    true
}

// =============================================================================
// Event
// =============================================================================

/// A named, timestamped occurrence with arbitrary properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Event {
    /// Unique identifier (UUID v4), used to reconcile acknowledgements.
    pub id: String,

    /// Event name, e.g. `"signup"` or `"$view"`.
    pub name: String,

    /// Caller-supplied properties.
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub properties: Properties,

    /// Seconds since the Unix epoch, with millisecond precision.
    pub time: f64,

    /// Always `true`; lets the collector tell client events from server ones.
    #[serde(default = "default_js")]
    pub js: bool,

    /// Visit token captured when the session became ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_token: Option<String>,

    /// Visitor token captured when the session became ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor_token: Option<String>,
}

impl Event {
    /// Creates an event stamped with the current time.
    pub fn new(name: impl Into<String>, properties: Properties) -> Self {
        Self::at(name, properties, Utc::now())
    }

    /// Creates an event stamped with the given time.
    pub fn at(name: impl Into<String>, properties: Properties, occurred_at: DateTime<Utc>) -> Self {
        Event {
            id: generate_token(),
            name: name.into(),
            properties,
            time: occurred_at.timestamp_millis() as f64 / 1000.0,
            js: true,
            visit_token: None,
            visitor_token: None,
        }
    }

    /// Returns the occurrence time, if `time` is representable.
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((self.time * 1000.0).round() as i64)
    }

    /// Attaches the session tokens observed at enrichment time.
    pub fn enrich(&mut self, visit_token: Option<String>, visitor_token: Option<String>) {
        self.visit_token = visit_token;
        self.visitor_token = visitor_token;
    }
}

// =============================================================================
// Event Envelope
// =============================================================================

/// Request body for the event delivery endpoint.
///
/// ## Wire Formats
/// ```text
/// Acknowledged (JSON):            Fire-and-forget (form):
/// {                               visit_token=...
///   "events": [{...}],            visitor_token=...
///   "visit_token": "...",         authenticity_token=...   (if known)
///   "visitor_token": "..."        events_json=[{...}]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EventEnvelope {
    /// The events carried by this request (tokens stripped).
    pub events: Vec<Event>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor_token: Option<String>,
}

impl EventEnvelope {
    /// Wraps a single event, lifting its tokens to the envelope.
    ///
    /// With `correlate == false` (client-side identity disabled) the tokens are
    /// dropped entirely.
    pub fn for_event(event: &Event, correlate: bool) -> Self {
        let mut event = event.clone();
        let visit_token = event.visit_token.take();
        let visitor_token = event.visitor_token.take();

        let (visit_token, visitor_token) = if correlate {
            (visit_token, visitor_token)
        } else {
            (None, None)
        };

        EventEnvelope {
            events: vec![event],
            visit_token,
            visitor_token,
        }
    }

    /// Encodes the envelope as form fields for the fire-and-forget transport.
    ///
    /// The event list travels as one JSON text field (`events_json`) so that
    /// property types survive form encoding.
    pub fn to_form_fields(&self, csrf: Option<(&str, &str)>) -> CoreResult<Vec<(String, String)>> {
        let mut fields = Vec::with_capacity(4);

        if let Some(token) = &self.visit_token {
            fields.push(("visit_token".to_string(), token.clone()));
        }
        if let Some(token) = &self.visitor_token {
            fields.push(("visitor_token".to_string(), token.clone()));
        }
        if let Some((param, token)) = csrf {
            fields.push((param.to_string(), token.to_string()));
        }

        fields.push(("events_json".to_string(), serde_json::to_string(&self.events)?));
        Ok(fields)
    }
}

// =============================================================================
// Visit Payload
// =============================================================================

/// Request body for the session-creation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitPayload {
    pub visit_token: String,
    pub visitor_token: String,
    pub platform: String,
    pub landing_page: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub js: bool,

    /// Only sent when the host reports a non-empty referrer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,

    /// Configured default visit parameters, merged into the body last.
    #[serde(skip)]
    pub params: Properties,
}

impl VisitPayload {
    /// Builds the JSON body. Configured params override built-in keys.
    pub fn to_body(&self) -> CoreResult<Value> {
        let mut body = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Properties::new(),
        };

        for (key, value) in &self.params {
            body.insert(key.clone(), value.clone());
        }

        Ok(Value::Object(body))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
