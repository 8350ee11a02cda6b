//! # Tracker Agent
//!
//! The actor that owns all tracker state, and the handle callers talk to.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Tracker Agent                                   │
//! │                                                                         │
//! │  TrackerHandle (Clone)                                                 │
//! │    track / track_view / start / configure / reset / debug / ...        │
//! │        │                                                                │
//! │        │ Command (unbounded mpsc)                                        │
//! │        ▼                                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │ TrackerAgent::run  (one task, one command at a time)           │   │
//! │  │                                                                 │   │
//! │  │  ReadyGate<Deferred> ──mark_ready──► runnable ──► run_deferred │   │
//! │  │        ▲                                              │         │   │
//! │  │        └────────────── schedule(work) ◄───────────────┘         │   │
//! │  │                                                                 │   │
//! │  │  SessionEstablisher   EventOutbox   IdentityStore   config     │   │
//! │  └───────────────────────────▲─────────────────────────────────────┘   │
//! │                              │ Signal (unbounded mpsc)                  │
//! │  DeliveryScheduler tasks ────┘  visit ack, event ack, debounce         │
//! │                                                                         │
//! │  Deferred work runs only inside the actor, so identity, queue and     │
//! │  gate mutations never interleave. Network calls and timers are the    │
//! │  only suspension points; they come back as signals.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tracking Path
//! ```text
//! track(E) ──► gate ──► Track(E): no visit token? establish (closes gate)
//!                          └──► gate ──► Enrich(E): attach tokens
//!                                          ├── beacon ──► done
//!                                          └── outbox.push(E), debounce
//!                                                 └──► gate ──► Deliver(E)
//!                                                        └── 2xx ──► ack(E.id)
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use footfall_core::validation::validate_selector;
use footfall_core::{
    Event, Properties, ReadyGate, SessionState, DEBUG_KEY, EVENTS_KEY, TRACK_PENDING_KEY,
    VISITOR_KEY, VISIT_KEY,
};

use crate::config::{ConfigOverrides, TrackerConfig};
use crate::delivery::{DeliveryScheduler, Signal};
use crate::error::{TrackerError, TrackerResult};
use crate::host::{HostEnvironment, StaticHost};
use crate::identity::IdentityStore;
use crate::interactions::{element_properties, Binding, DomNode, InteractionKind};
use crate::outbox::EventOutbox;
use crate::session::{Establishment, SessionEstablisher};
use crate::storage::{MemoryStorage, Storage};
use crate::transport::{HttpTransport, Transport};

/// Lifetime of the debug flag (one year).
const DEBUG_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Logs at `info` in debug mode and at `debug` otherwise.
macro_rules! verbose {
    ($agent:expr, $($arg:tt)+) => {
        if $agent.debug_mode {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

// =============================================================================
// Tracker Status
// =============================================================================

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerStatus {
    pub session_state: SessionState,

    /// Whether gated work currently runs without waiting.
    pub ready: bool,

    pub started: bool,

    /// Events waiting for acknowledgment.
    pub pending_count: usize,

    pub debug: bool,
}

// =============================================================================
// Commands
// =============================================================================

enum Command {
    Configure {
        overrides: ConfigOverrides,
        reply: oneshot::Sender<TrackerResult<()>>,
    },
    Start,
    Track(Event),
    TrackView {
        extra: Option<Properties>,
        at: DateTime<Utc>,
    },
    Bind(Binding),
    Interaction {
        kind: InteractionKind,
        target: Arc<dyn DomNode>,
        at: DateTime<Utc>,
    },
    Lookup {
        key: &'static str,
        reply: oneshot::Sender<Option<String>>,
    },
    Reset {
        reply: oneshot::Sender<bool>,
    },
    Debug {
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<TrackerStatus>,
    },
    PendingEvents {
        reply: oneshot::Sender<Vec<Event>>,
    },
    Shutdown,
}

/// Work that waits for the ready gate.
#[derive(Debug)]
enum Deferred {
    /// Make sure a session exists, then enrich.
    Track(Event),
    /// Attach tokens and pick a transport.
    Enrich(Event),
    /// Acknowledged delivery of a queued event.
    Deliver(Event),
}

// =============================================================================
// Tracker Agent
// =============================================================================

struct TrackerAgent {
    config: Arc<TrackerConfig>,
    identity: IdentityStore,
    host: Arc<dyn HostEnvironment>,
    delivery: DeliveryScheduler,
    session: SessionEstablisher,
    outbox: EventOutbox,
    gate: ReadyGate<Deferred>,
    runnable: VecDeque<Deferred>,
    bindings: Vec<Binding>,
    started: bool,
    debug_mode: bool,

    /// Visit token of the session-creation call in flight, if any.
    in_flight: Option<String>,
}

impl TrackerAgent {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut signals: mpsc::UnboundedReceiver<Signal>,
    ) {
        self.restore().await;
        info!(platform = %self.config.tracking.platform, "Tracker running");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(signal) = signals.recv() => self.handle_signal(signal).await,
            }

            self.drain().await;
        }

        info!(pending = self.outbox.len(), "Tracker stopped");
    }

    /// Loads the debug flag and replays events left by a previous lifetime.
    async fn restore(&mut self) {
        self.debug_mode = self.identity.get(DEBUG_KEY).await.is_some();
        self.outbox = EventOutbox::load(&self.config, &self.identity).await;

        let replay: Vec<Event> = self.outbox.snapshot().to_vec();
        if !replay.is_empty() {
            verbose!(self, count = replay.len(), "Replaying unacknowledged events");
        }
        for event in replay {
            self.schedule(Deferred::Deliver(event));
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Configure { overrides, reply } => {
                let _ = reply.send(self.configure(&overrides));
            }
            Command::Start => self.start().await,
            Command::Track(event) => self.schedule(Deferred::Track(event)),
            Command::TrackView { extra, at } => {
                let mut properties = Properties::new();
                properties.insert("url".into(), Value::String(self.host.location()));
                properties.insert("title".into(), Value::String(self.host.title()));
                properties.insert("page".into(), Value::String(self.page()));
                if let Some(extra) = extra {
                    properties.extend(extra);
                }
                self.schedule(Deferred::Track(Event::at("$view", properties, at)));
            }
            Command::Bind(binding) => {
                debug!(kind = %binding.kind, selector = %binding.selector, "Binding registered");
                self.bindings.push(binding);
            }
            Command::Interaction { kind, target, at } => {
                self.handle_interaction(kind, target.as_ref(), at)
            }
            Command::Lookup { key, reply } => {
                let _ = reply.send(self.identity.get(key).await);
            }
            Command::Reset { reply } => {
                self.reset().await;
                let _ = reply.send(true);
            }
            Command::Debug { enabled, reply } => {
                self.set_debug(enabled).await;
                let _ = reply.send(true);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::PendingEvents { reply } => {
                let _ = reply.send(self.outbox.snapshot().to_vec());
            }
            Command::Shutdown => {}
        }
    }

    fn configure(&mut self, overrides: &ConfigOverrides) -> TrackerResult<()> {
        let config = self.config.merged(overrides);
        config.validate()?;

        self.identity.set_domain(config.storage.domain.clone());
        self.outbox.configure(&config);
        self.config = Arc::new(config);

        debug!("Configuration replaced");
        Ok(())
    }

    async fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.establish().await;
    }

    fn handle_interaction(&mut self, kind: InteractionKind, target: &dyn DomNode, at: DateTime<Utc>) {
        let page = self.page();
        let matched: Vec<Arc<dyn DomNode>> = self
            .bindings
            .iter()
            .filter(|binding| binding.kind == kind)
            .filter_map(|binding| binding.resolve(target))
            .collect();

        for node in matched {
            let properties = element_properties(kind, node.as_ref(), &page);
            self.schedule(Deferred::Track(Event::at(kind.event_name(), properties, at)));
        }
    }

    async fn reset(&mut self) {
        for key in [VISIT_KEY, VISITOR_KEY, EVENTS_KEY, TRACK_PENDING_KEY] {
            if let Err(e) = self.identity.destroy(key).await {
                warn!(key, error = %e, "Could not destroy entry");
            }
        }
        self.outbox.clear();
        self.session.reset();
        verbose!(self, "Identity reset");

        // Work parked behind the abandoned visit waits for a fresh one; a late
        // acknowledgment of the old visit no longer matches `in_flight`.
        if let Some(abandoned) = self.in_flight.take() {
            debug!(visit = %abandoned, "Abandoning in-flight visit");
            self.establish().await;
        }
    }

    async fn set_debug(&mut self, enabled: bool) {
        let result = if enabled {
            self.identity.set(DEBUG_KEY, "t", DEBUG_TTL).await
        } else {
            self.identity.destroy(DEBUG_KEY).await
        };
        if let Err(e) = result {
            warn!(error = %e, "Could not persist debug flag");
        }
        self.debug_mode = enabled;
    }

    fn status(&self) -> TrackerStatus {
        TrackerStatus {
            session_state: self.session.state(),
            ready: self.gate.is_ready(),
            started: self.started,
            pending_count: self.outbox.len(),
            debug: self.debug_mode,
        }
    }

    fn page(&self) -> String {
        self.config
            .tracking
            .page
            .clone()
            .unwrap_or_else(|| self.host.pathname())
    }

    // =========================================================================
    // Signals
    // =========================================================================

    async fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::VisitAcknowledged { visit_token } => {
                if self.in_flight.as_deref() != Some(visit_token.as_str()) {
                    debug!(visit = %visit_token, "Ignoring stale visit acknowledgment");
                    return;
                }
                self.in_flight = None;
                self.session.complete(&self.identity).await;
                self.open_gate();
            }
            Signal::EventAcknowledged { id } => {
                if self.outbox.acknowledge(&self.identity, &id).await {
                    debug!(id = %id, "Event acknowledged");
                }
            }
            Signal::DebounceElapsed(event) => self.schedule(Deferred::Deliver(event)),
        }
    }

    // =========================================================================
    // Ready Gate
    // =========================================================================

    fn schedule(&mut self, work: Deferred) {
        if let Some(work) = self.gate.when_ready(work) {
            self.runnable.push_back(work);
        }
    }

    fn open_gate(&mut self) {
        let wave = self.gate.mark_ready();
        self.runnable.extend(wave);
    }

    async fn drain(&mut self) {
        while let Some(work) = self.runnable.pop_front() {
            self.run_deferred(work).await;
        }
    }

    async fn run_deferred(&mut self, work: Deferred) {
        match work {
            Deferred::Track(event) => {
                if self.config.storage.enabled
                    && self.session.can_begin()
                    && self.identity.get(VISIT_KEY).await.is_none()
                {
                    self.establish().await;
                }
                self.schedule(Deferred::Enrich(event));
            }
            Deferred::Enrich(event) => self.enrich(event).await,
            Deferred::Deliver(event) => {
                if let Err(e) = self.delivery.deliver(&self.config, self.host.as_ref(), &event) {
                    warn!(id = %event.id, error = %e, "Could not deliver event");
                }
            }
        }
    }

    // =========================================================================
    // Session and Delivery
    // =========================================================================

    async fn establish(&mut self) {
        self.gate.close();

        let outcome = self
            .session
            .begin(&self.config, &self.identity, self.host.as_ref())
            .await;

        match outcome {
            Establishment::Disabled(reason) => {
                verbose!(self, "{}", reason);
                self.open_gate();
            }
            Establishment::Resumed => {
                verbose!(self, "Active visit");
                self.open_gate();
            }
            Establishment::Dispatch(payload) => {
                verbose!(
                    self,
                    visit = %payload.visit_token,
                    visitor = %payload.visitor_token,
                    landing_page = %payload.landing_page,
                    "Visit started"
                );
                match self
                    .delivery
                    .create_visit(&self.config, self.host.as_ref(), &payload)
                {
                    Ok(()) => self.in_flight = Some(payload.visit_token),
                    Err(e) => error!(error = %e, "Could not send visit"),
                }
            }
        }
    }

    async fn enrich(&mut self, mut event: Event) {
        verbose!(self, name = %event.name, id = %event.id, properties = ?event.properties, "Event");

        if self.config.storage.enabled {
            let visit = self.identity.get(VISIT_KEY).await;
            let visitor = self.identity.get(VISITOR_KEY).await;
            event.enrich(visit, visitor);
        }

        if self.delivery.can_send_now(&self.config) {
            match self
                .delivery
                .send_now(&self.config, self.host.as_ref(), &event)
            {
                Ok(true) => return,
                Ok(false) => debug!(id = %event.id, "Beacon refused; queueing"),
                Err(e) => warn!(id = %event.id, error = %e, "Beacon failed; queueing"),
            }
        }

        self.outbox.push(&self.identity, event.clone()).await;
        self.delivery.debounce(self.config.debounce(), event);
    }
}

// =============================================================================
// Tracker Handle
// =============================================================================

/// Handle to a running tracker. Cheap to clone; every clone talks to the same
/// actor. The actor stops when the last handle is dropped or on `shutdown`.
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl TrackerHandle {
    /// Starts building a tracker.
    pub fn builder(config: TrackerConfig) -> TrackerBuilder {
        TrackerBuilder::new(config)
    }

    fn send(&self, command: Command) -> TrackerResult<()> {
        self.commands
            .send(command)
            .map_err(|_| TrackerError::ShuttingDown)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> TrackerResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        rx.await
            .map_err(|e| TrackerError::ChannelError(e.to_string()))
    }

    /// Replaces the configuration snapshot with `overrides` merged on top.
    pub async fn configure(&self, overrides: ConfigOverrides) -> TrackerResult<()> {
        self.request(|reply| Command::Configure { overrides, reply })
            .await?
    }

    /// Establishes the session. Only the first call in a lifetime does
    /// anything.
    pub fn start(&self) -> bool {
        self.send(Command::Start).is_ok()
    }

    /// Records an event.
    pub fn track(&self, name: impl Into<String>, properties: Properties) -> bool {
        self.send(Command::Track(Event::new(name, properties))).is_ok()
    }

    /// Records a `$view` event for the current location.
    pub fn track_view(&self, extra: Option<Properties>) -> bool {
        self.send(Command::TrackView {
            extra,
            at: Utc::now(),
        })
        .is_ok()
    }

    /// Records `$click` for interactions matching `selector`.
    pub fn track_clicks(&self, selector: &str) -> TrackerResult<()> {
        self.bind(InteractionKind::Click, selector)
    }

    /// Records `$submit` for interactions matching `selector`.
    pub fn track_submits(&self, selector: &str) -> TrackerResult<()> {
        self.bind(InteractionKind::Submit, selector)
    }

    /// Records `$change` for interactions matching `selector`.
    #[deprecated(note = "change tracking will be removed; track explicit events instead")]
    pub fn track_changes(&self, selector: &str) -> TrackerResult<()> {
        warn!("track_changes is deprecated and will be removed");
        self.bind(InteractionKind::Change, selector)
    }

    fn bind(&self, kind: InteractionKind, selector: &str) -> TrackerResult<()> {
        let selector = validate_selector(Some(selector))?;
        self.send(Command::Bind(Binding::new(kind, selector)))
    }

    /// Reports a host interaction to the registered bindings.
    pub fn handle_interaction(&self, kind: InteractionKind, target: Arc<dyn DomNode>) -> bool {
        self.send(Command::Interaction {
            kind,
            target,
            at: Utc::now(),
        })
        .is_ok()
    }

    pub async fn visit_id(&self) -> Option<String> {
        self.request(|reply| Command::Lookup {
            key: VISIT_KEY,
            reply,
        })
        .await
        .ok()
        .flatten()
    }

    pub async fn visitor_id(&self) -> Option<String> {
        self.request(|reply| Command::Lookup {
            key: VISITOR_KEY,
            reply,
        })
        .await
        .ok()
        .flatten()
    }

    /// Same as [`TrackerHandle::visit_id`].
    pub async fn visit_token(&self) -> Option<String> {
        self.visit_id().await
    }

    /// Same as [`TrackerHandle::visitor_id`].
    pub async fn visitor_token(&self) -> Option<String> {
        self.visitor_id().await
    }

    /// Forgets identity and queued events.
    pub async fn reset(&self) -> bool {
        self.request(|reply| Command::Reset { reply })
            .await
            .unwrap_or(false)
    }

    /// Turns debug mode on or off (persisted for a year).
    pub async fn debug(&self, enabled: bool) -> bool {
        self.request(|reply| Command::Debug { enabled, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn status(&self) -> TrackerResult<TrackerStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Events not yet acknowledged, oldest first.
    pub async fn pending_events(&self) -> TrackerResult<Vec<Event>> {
        self.request(|reply| Command::PendingEvents { reply }).await
    }

    /// Stops the actor. Outstanding work is abandoned.
    pub fn shutdown(&self) {
        let _ = self.send(Command::Shutdown);
    }
}

// =============================================================================
// Tracker Builder
// =============================================================================

/// Builder for a tracker.
///
/// ## Example
/// ```rust,no_run
/// use footfall_agent::{StaticHost, TrackerBuilder, TrackerConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> footfall_agent::TrackerResult<()> {
/// // Endpoints resolve against the host's origin unless `url_prefix` is set.
/// let tracker = TrackerBuilder::new(TrackerConfig::load_or_default(None))
///     .with_host(Arc::new(StaticHost::new("https://shop.example.com/pricing")))
///     .spawn()?;
/// tracker.track("signup", serde_json::Map::new());
/// # Ok(())
/// # }
/// ```
pub struct TrackerBuilder {
    config: TrackerConfig,
    storage: Option<Arc<dyn Storage>>,
    transport: Option<Arc<dyn Transport>>,
    host: Option<Arc<dyn HostEnvironment>>,
}

/// [`HttpTransport`] for the host. Relative endpoints resolve against the
/// host's origin; without one they cannot be reached at all.
fn default_transport(config: &TrackerConfig, host: &dyn HostEnvironment) -> TrackerResult<HttpTransport> {
    let transport = HttpTransport::from_config(config)?;
    match host.origin() {
        Some(origin) => transport.with_origin(&origin),
        None if config.endpoint.url_prefix.is_empty() => Err(TrackerError::InvalidConfig(format!(
            "url_prefix is empty and {} has no http(s) origin to resolve endpoints against",
            host.location()
        ))),
        None => Ok(transport),
    }
}

impl TrackerBuilder {
    pub fn new(config: TrackerConfig) -> Self {
        TrackerBuilder {
            config,
            storage: None,
            transport: None,
            host: None,
        }
    }

    /// Sets the storage backend (defaults to [`MemoryStorage`]).
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the transport (defaults to [`HttpTransport`]).
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the host environment (defaults to [`StaticHost`]).
    pub fn with_host(mut self, host: Arc<dyn HostEnvironment>) -> Self {
        self.host = Some(host);
        self
    }

    /// Validates the configuration and spawns the actor on the current tokio
    /// runtime. Starts it right away when `start_on_ready` is set.
    pub fn spawn(self) -> TrackerResult<TrackerHandle> {
        self.config.validate()?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TrackerError::Internal(format!("No tokio runtime: {}", e)))?;

        let storage: Arc<dyn Storage> = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let host: Arc<dyn HostEnvironment> = self
            .host
            .unwrap_or_else(|| Arc::new(StaticHost::default()));
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(default_transport(&self.config, host.as_ref())?),
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let start_on_ready = self.config.tracking.start_on_ready;
        let identity = IdentityStore::new(storage, self.config.storage.domain.clone());
        let outbox = EventOutbox::new(&self.config);

        let agent = TrackerAgent {
            config: Arc::new(self.config),
            identity,
            host,
            delivery: DeliveryScheduler::new(transport, signal_tx),
            session: SessionEstablisher::new(),
            outbox,
            gate: ReadyGate::new(),
            runnable: VecDeque::new(),
            bindings: Vec::new(),
            started: false,
            debug_mode: false,
            in_flight: None,
        };

        runtime.spawn(agent.run(command_rx, signal_rx));

        let handle = TrackerHandle {
            commands: command_tx,
        };
        if start_on_ready {
            handle.start();
        }
        Ok(handle)
    }
}
