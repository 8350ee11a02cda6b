//! # footfall-agent: The Telemetry Tracker
//!
//! Establishes an anonymous visit/visitor session, records named events and
//! delivers them to a collector, surviving restarts and transient network
//! failure.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tracker Architecture                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 TrackerHandle (public entry points)              │  │
//! │  │  configure · start · track · track_view · track_clicks ·         │  │
//! │  │  track_submits · visit_id · visitor_id · reset · debug           │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ commands                                │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                TrackerAgent (single tokio task)                  │  │
//! │  │   ReadyGate · SessionEstablisher · EventOutbox · IdentityStore   │  │
//! │  └──────┬──────────────────────┬──────────────────────┬────────────┘  │
//! │         ▼                      ▼                      ▼                 │
//! │  ┌────────────────┐  ┌────────────────────┐  ┌────────────────────┐    │
//! │  │ Storage        │  │ DeliveryScheduler  │  │ HostEnvironment    │    │
//! │  │ SQLite, memory │  │ beacon or POST,    │  │ location, title,   │    │
//! │  │ or disabled    │  │ debounce, acks     │  │ referrer, CSRF     │    │
//! │  └────────────────┘  └─────────┬──────────┘  └────────────────────┘    │
//! │                                ▼                                        │
//! │                       Transport (reqwest)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - Actor, `TrackerHandle` and `TrackerBuilder`
//! - [`config`] - TOML/env configuration and runtime overrides
//! - [`delivery`] - Transport selection, debounce and acknowledgments
//! - [`error`] - Tracker error types
//! - [`host`] - Host environment collaborator
//! - [`identity`] - Named-entry facade over storage
//! - [`interactions`] - Click/submit/change bindings
//! - [`logging`] - `tracing` subscriber setup
//! - [`outbox`] - Persisted queue of unacknowledged events
//! - [`session`] - Session establishment state machine
//! - [`storage`] - Storage trait and backends
//! - [`transport`] - HTTP transport
//!
//! ## Usage
//!
//! ```rust,ignore
//! use footfall_agent::{TrackerBuilder, TrackerConfig, StaticHost};
//! use std::sync::Arc;
//!
//! let config = TrackerConfig::load_or_default(None);
//! let tracker = TrackerBuilder::new(config)
//!     .with_host(Arc::new(StaticHost::new("https://shop.example.com/pricing")))
//!     .spawn()?;
//!
//! let mut properties = serde_json::Map::new();
//! properties.insert("plan".into(), "pro".into());
//! tracker.track("signup", properties);
//!
//! println!("Visit: {:?}", tracker.visit_id().await);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod delivery;
pub mod error;
pub mod host;
pub mod identity;
pub mod interactions;
pub mod logging;
pub mod outbox;
pub mod session;
pub mod storage;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{TrackerBuilder, TrackerHandle, TrackerStatus};
pub use config::{ConfigOverrides, EndpointSettings, StorageSettings, TrackerConfig, TrackingSettings};
pub use error::{TrackerError, TrackerResult};
pub use host::{HostEnvironment, StaticHost};
pub use interactions::{DomNode, InteractionKind, StaticElement};
pub use logging::init_tracing;
pub use storage::{DisabledStorage, MemoryStorage, Storage};
pub use transport::{HttpTransport, OutboundRequest, Transport};

pub use footfall_core::{Event, Properties, SessionState};
