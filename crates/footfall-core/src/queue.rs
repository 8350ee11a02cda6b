//! # Event Queue
//!
//! Ordered, deduplicating queue of events awaiting acknowledgement.
//!
//! ## Queue Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Event Queue Flow                                 │
//! │                                                                         │
//! │  process start ──► restore(snapshot) ──► [E1, E2]   (replay these)     │
//! │                                                                         │
//! │  track(E3)     ──► enqueue(E3)       ──► [E1, E2, E3] ──► to_json()    │
//! │                                                                         │
//! │  ack(E1)       ──► dequeue(E1.id)    ──► [E2, E3]     ──► to_json()    │
//! │                                                                         │
//! │  Every mutation is followed by to_json() + persist by the owner, so    │
//! │  the stored snapshot equals the set of unacknowledged events.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This type only does the bookkeeping. Persisting the snapshot is the job of
//! the agent's outbox, which owns the storage handle.

use crate::error::CoreResult;
use crate::types::Event;

/// Ordered sequence of unacknowledged events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQueue {
    events: Vec<Event>,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a queue from a persisted snapshot.
    ///
    /// `None` and the empty string both mean "nothing persisted".
    pub fn restore(serialized: Option<&str>) -> CoreResult<Self> {
        let events = match serialized {
            Some(text) if !text.trim().is_empty() => serde_json::from_str(text)?,
            _ => Vec::new(),
        };
        Ok(EventQueue { events })
    }

    /// Serializes the full queue as a JSON array.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(&self.events)?)
    }

    /// Appends an event at the back.
    pub fn enqueue(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Removes the first event with the given id.
    pub fn dequeue(&mut self, id: &str) -> Option<Event> {
        let index = self.events.iter().position(|e| e.id == id)?;
        Some(self.events.remove(index))
    }

    /// Returns the queued events in insertion order.
    pub fn snapshot(&self) -> &[Event] {
        &self.events
    }

    pub fn contains(&self, id: &str) -> bool {
        self.events.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops every queued event.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
