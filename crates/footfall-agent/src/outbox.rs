//! # Event Outbox
//!
//! The durable half of the event queue: every unacknowledged event lives in
//! storage until the collector confirms it, so a restart replays it.
//!
//! ## Outbox Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Event Outbox Flow                                │
//! │                                                                         │
//! │  tracker start ──► load()        read footfall_events, replay contents  │
//! │                                                                         │
//! │  enrich(E)     ──► push(E)       queue + persist snapshot (1 minute)    │
//! │                                                                         │
//! │  2xx for E     ──► acknowledge(E.id)  remove + persist snapshot         │
//! │                                                                         │
//! │  reset()       ──► clear()       in-memory only; the key is destroyed  │
//! │                                  by the identity reset                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes are skipped while storage is disabled. The read at load happens
//! regardless, so a snapshot left by an earlier lifetime is still replayed.

use std::time::Duration;
use tracing::{debug, warn};

use footfall_core::{Event, EventQueue, EVENTS_KEY};

use crate::config::TrackerConfig;
use crate::identity::IdentityStore;

/// Persisted queue of unacknowledged events.
#[derive(Debug, Clone)]
pub struct EventOutbox {
    queue: EventQueue,
    persist: bool,
    ttl: Duration,
}

impl EventOutbox {
    /// Creates an empty outbox following the storage settings of `config`.
    pub fn new(config: &TrackerConfig) -> Self {
        EventOutbox {
            queue: EventQueue::new(),
            persist: config.storage.enabled,
            ttl: config.queue_ttl(),
        }
    }

    /// Restores the snapshot left by a previous lifetime.
    ///
    /// A corrupt snapshot is logged and treated as empty.
    pub async fn load(config: &TrackerConfig, identity: &IdentityStore) -> Self {
        let mut outbox = Self::new(config);
        let snapshot = identity.get(EVENTS_KEY).await;

        match EventQueue::restore(snapshot.as_deref()) {
            Ok(queue) => outbox.queue = queue,
            Err(e) => warn!(error = %e, "Discarding unreadable event queue"),
        }

        if !outbox.queue.is_empty() {
            debug!(count = outbox.queue.len(), "Restored unacknowledged events");
        }
        outbox
    }

    /// Follows new storage settings.
    pub fn configure(&mut self, config: &TrackerConfig) {
        self.persist = config.storage.enabled;
        self.ttl = config.queue_ttl();
    }

    /// Appends an event and persists the queue.
    pub async fn push(&mut self, identity: &IdentityStore, event: Event) {
        self.queue.enqueue(event);
        self.persist(identity).await;
    }

    /// Removes the first event with `id` and persists the queue.
    ///
    /// Returns false if the event had already been acknowledged.
    pub async fn acknowledge(&mut self, identity: &IdentityStore, id: &str) -> bool {
        if self.queue.dequeue(id).is_none() {
            return false;
        }
        self.persist(identity).await;
        true
    }

    /// Queued events, oldest first.
    pub fn snapshot(&self) -> &[Event] {
        self.queue.snapshot()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Forgets every queued event without touching storage.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    async fn persist(&self, identity: &IdentityStore) {
        if !self.persist {
            return;
        }

        let snapshot = match self.queue.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Could not serialize event queue");
                return;
            }
        };

        if let Err(e) = identity.set(EVENTS_KEY, &snapshot, self.ttl).await {
            warn!(error = %e, "Could not persist event queue");
        }
    }
}
