//! # Session Establisher
//!
//! Creates or resumes the visit/visitor session at most once per tracker
//! lifetime.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Session Establishment                              │
//! │                                                                         │
//! │  ┌─────────┐  begin()  ┌──────────────┐  complete()  ┌────────┐        │
//! │  │ Unknown │ ────────► │ Establishing │ ───────────► │ Active │        │
//! │  └─────────┘           └──────┬───────┘              └────────┘        │
//! │       ▲                       │                           ▲             │
//! │       │ reset()               │ tracking off or           │ tokens and  │
//! │       │                       │ storage unusable          │ no marker   │
//! │       │                       ▼                           │ (Resumed)   │
//! │       │                 ┌──────────┐                      │             │
//! │       └──────────────── │ Disabled │        begin() ──────┘             │
//! │                         └──────────┘                                    │
//! │                                                                         │
//! │  begin() does every read and write up to the network call and hands   │
//! │  back what the actor must do next. The POST itself runs in a task;    │
//! │  its acknowledgment comes back as complete().                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pending marker is written right before the session-creation call and
//! destroyed on acknowledgment. A marker found at startup therefore means the
//! previous lifetime never heard back, and the session is recreated with the
//! same tokens.

use tracing::warn;

use footfall_core::{
    decide, generate_token, EntryDecision, SessionState, StoredIdentity, VisitPayload,
    TRACK_PENDING_KEY, VISITOR_KEY, VISIT_KEY,
};

use crate::config::TrackerConfig;
use crate::host::HostEnvironment;
use crate::identity::IdentityStore;

/// Why establishment ended in [`SessionState::Disabled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    /// `track_visits = false`.
    VisitTrackingOff,
    /// `storage.enabled = false`.
    StorageOff,
    /// A freshly written visit token did not read back.
    StorageUnavailable,
}

impl std::fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisabledReason::VisitTrackingOff => write!(f, "Visit tracking disabled"),
            DisabledReason::StorageOff => write!(f, "Storage disabled"),
            DisabledReason::StorageUnavailable => write!(f, "Storage unavailable"),
        }
    }
}

/// What the actor does after [`SessionEstablisher::begin`].
#[derive(Debug, Clone, PartialEq)]
pub enum Establishment {
    /// Open the gate; no session is tracked.
    Disabled(DisabledReason),
    /// Open the gate; the stored session is reused.
    Resumed,
    /// Send this payload and open the gate once it is acknowledged.
    Dispatch(VisitPayload),
}

/// Owner of the derived session state.
#[derive(Debug, Default)]
pub struct SessionEstablisher {
    state: SessionState,
}

impl SessionEstablisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a new establishment may start now.
    pub fn can_begin(&self) -> bool {
        !matches!(self.state, SessionState::Establishing | SessionState::Disabled)
    }

    /// Runs the entry conditions and prepares the session-creation call.
    pub async fn begin(
        &mut self,
        config: &TrackerConfig,
        identity: &IdentityStore,
        host: &dyn HostEnvironment,
    ) -> Establishment {
        self.state = SessionState::Establishing;

        let tracking = config.tracking.track_visits;
        let storage = config.storage.enabled;

        // Identity is not read at all while tracking or storage is off.
        let stored = if tracking && storage {
            StoredIdentity {
                visit_token: identity.get(VISIT_KEY).await,
                visitor_token: identity.get(VISITOR_KEY).await,
                track_pending: identity.get(TRACK_PENDING_KEY).await.is_some(),
            }
        } else {
            StoredIdentity::default()
        };

        match decide(storage, tracking, &stored) {
            EntryDecision::Disabled if !tracking => self.disable(DisabledReason::VisitTrackingOff),
            EntryDecision::Disabled => self.disable(DisabledReason::StorageOff),
            EntryDecision::Resume => {
                if config.tracking.keep_alive {
                    if let Some(visit) = &stored.visit_token {
                        if let Err(e) = identity.set(VISIT_KEY, visit, config.visit_ttl()).await {
                            warn!(error = %e, "Could not extend visit");
                        }
                    }
                }
                self.state = SessionState::Active;
                Establishment::Resumed
            }
            EntryDecision::Establish => self.prepare(config, identity, host, stored).await,
        }
    }

    async fn prepare(
        &mut self,
        config: &TrackerConfig,
        identity: &IdentityStore,
        host: &dyn HostEnvironment,
        stored: StoredIdentity,
    ) -> Establishment {
        if stored.visit_token.is_none() {
            let generated = generate_token();
            if let Err(e) = identity.set(VISIT_KEY, &generated, config.visit_ttl()).await {
                warn!(error = %e, "Could not store visit token");
            }
        }

        let visit_token = match identity.get(VISIT_KEY).await {
            Some(token) => token,
            None => return self.disable(DisabledReason::StorageUnavailable),
        };

        let visitor_token = match stored.visitor_token {
            Some(token) => token,
            None => {
                let generated = generate_token();
                if let Err(e) = identity
                    .set(VISITOR_KEY, &generated, config.visitor_ttl())
                    .await
                {
                    warn!(error = %e, "Could not store visitor token");
                }
                generated
            }
        };

        if let Err(e) = identity.set(TRACK_PENDING_KEY, "t", config.visit_ttl()).await {
            warn!(error = %e, "Could not mark session creation as pending");
        }

        let (screen_width, screen_height) = host.screen_size();

        Establishment::Dispatch(VisitPayload {
            visit_token,
            visitor_token,
            platform: config.tracking.platform.clone(),
            landing_page: host.location(),
            screen_width,
            screen_height,
            js: true,
            referrer: host.referrer(),
            params: config.tracking.visit_params.clone(),
        })
    }

    /// Records the collector's acknowledgment of the session-creation call.
    pub async fn complete(&mut self, identity: &IdentityStore) {
        if let Err(e) = identity.destroy(TRACK_PENDING_KEY).await {
            warn!(error = %e, "Could not clear pending marker");
        }
        self.state = SessionState::Active;
    }

    /// Forgets the derived state so the next tracking call re-establishes.
    pub fn reset(&mut self) {
        self.state = SessionState::Unknown;
    }

    fn disable(&mut self, reason: DisabledReason) -> Establishment {
        self.state = SessionState::Disabled;
        Establishment::Disabled(reason)
    }
}
