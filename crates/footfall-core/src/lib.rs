//! # footfall-core: Pure Lifecycle Logic for footfall
//!
//! This crate holds the parts of the telemetry agent that can be reasoned
//! about without storage, network or timers: the event model, the queue, the
//! ready gate and the session entry decision.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        footfall Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Host (app, CLI, webview bridge)              │   │
//! │  │    track() ──► track_view() ──► handle_interaction()            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    footfall-agent (Tracker actor)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ footfall-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   queue   │  │   gate    │  │  session  │  │   │
//! │  │   │   Event   │  │EventQueue │  │ ReadyGate │  │  decide() │  │   │
//! │  │   │ Envelope  │  │           │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO NETWORK • NO TIMERS                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Event, envelopes, visit payload, token generation
//! - [`queue`] - Ordered queue of unacknowledged events
//! - [`gate`] - Ready gate (FIFO readiness barrier)
//! - [`session`] - Session state and entry decision
//! - [`validation`] - Caller input checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use footfall_core::{Event, EventEnvelope, EventQueue, Properties};
//!
//! let mut queue = EventQueue::new();
//! let mut event = Event::new("signup", Properties::new());
//! event.enrich(Some("visit".into()), Some("visitor".into()));
//! queue.enqueue(event.clone());
//!
//! let envelope = EventEnvelope::for_event(&event, true);
//! assert_eq!(envelope.visit_token.as_deref(), Some("visit"));
//!
//! queue.dequeue(&event.id);
//! assert!(queue.is_empty());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod gate;
pub mod queue;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use gate::ReadyGate;
pub use queue::EventQueue;
pub use session::{decide, EntryDecision, SessionState, StoredIdentity};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Storage entry holding the visit token.
pub const VISIT_KEY: &str = "footfall_visit";

/// Storage entry holding the visitor token.
pub const VISITOR_KEY: &str = "footfall_visitor";

/// Storage entry holding the JSON array of unacknowledged events.
pub const EVENTS_KEY: &str = "footfall_events";

/// Transient marker for a session creation that has not been acknowledged.
pub const TRACK_PENDING_KEY: &str = "footfall_track";

/// Debug-mode flag.
pub const DEBUG_KEY: &str = "footfall_debug";

/// Element attribute that opts a subtree out of interaction tracking.
pub const SKIP_ATTRIBUTE: &str = "data-footfall-skip";

/// Element attribute naming the page section an interaction happened in.
pub const SECTION_ATTRIBUTE: &str = "data-section";
