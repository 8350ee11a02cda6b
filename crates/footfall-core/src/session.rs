//! # Session Entry Decisions
//!
//! Pure half of session establishment: given what storage holds, decide which
//! path the establisher takes. The agent performs the reads, writes and the
//! network call.
//!
//! ## Decision Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  storage on │ visits on │ visit │ visitor │ pending ║ decision         │
//! │  ───────────┼───────────┼───────┼─────────┼─────────╫───────────────── │
//! │      no     │     *     │   *   │    *    │    *    ║ Disabled         │
//! │      *      │     no    │   *   │    *    │    *    ║ Disabled         │
//! │     yes     │    yes    │  yes  │   yes   │   no    ║ Resume           │
//! │     yes     │    yes    │     anything else         ║ Establish        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

/// Derived session state, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No establishment has run yet in this lifetime.
    #[default]
    Unknown,
    /// A session-creation call is in flight.
    Establishing,
    /// Visit and visitor tokens are in place and acknowledged.
    Active,
    /// Session tracking is off (configuration or unusable storage).
    Disabled,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unknown => write!(f, "unknown"),
            SessionState::Establishing => write!(f, "establishing"),
            SessionState::Active => write!(f, "active"),
            SessionState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Identity entries as read from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredIdentity {
    pub visit_token: Option<String>,
    pub visitor_token: Option<String>,
    /// Transient marker: a session creation that was never acknowledged.
    pub track_pending: bool,
}

/// Which path session establishment takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    /// Tracking is off; open the gate without touching identity.
    Disabled,
    /// An acknowledged session exists; reuse it.
    Resume,
    /// A session must be (re)created on the collector.
    Establish,
}

/// Evaluates the entry conditions in order.
pub fn decide(storage_enabled: bool, track_visits: bool, stored: &StoredIdentity) -> EntryDecision {
    if !storage_enabled || !track_visits {
        return EntryDecision::Disabled;
    }

    match (&stored.visit_token, &stored.visitor_token, stored.track_pending) {
        (Some(_), Some(_), false) => EntryDecision::Resume,
        _ => EntryDecision::Establish,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(visit: bool, visitor: bool, pending: bool) -> StoredIdentity {
        StoredIdentity {
            visit_token: visit.then(|| "v".to_string()),
            visitor_token: visitor.then(|| "u".to_string()),
            track_pending: pending,
        }
    }

    #[test]
    fn test_disabled_wins_over_everything() {
        let full = stored(true, true, false);
        assert_eq!(decide(false, true, &full), EntryDecision::Disabled);
        assert_eq!(decide(true, false, &full), EntryDecision::Disabled);
    }

    #[test]
    fn test_resume_requires_both_tokens_and_no_marker() {
        assert_eq!(decide(true, true, &stored(true, true, false)), EntryDecision::Resume);
        assert_eq!(decide(true, true, &stored(true, true, true)), EntryDecision::Establish);
        assert_eq!(decide(true, true, &stored(true, false, false)), EntryDecision::Establish);
        assert_eq!(decide(true, true, &stored(false, true, false)), EntryDecision::Establish);
        assert_eq!(decide(true, true, &stored(false, false, false)), EntryDecision::Establish);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Establishing.to_string(), "establishing");
        assert_eq!(SessionState::default(), SessionState::Unknown);
    }
}
