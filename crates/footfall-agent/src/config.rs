//! # Tracker Configuration
//!
//! Configuration management for the tracker.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Runtime overrides (highest priority)                               │
//! │     handle.configure(ConfigOverrides { .. })                           │
//! │                                                                         │
//! │  2. Environment Variables                                              │
//! │     FOOTFALL_URL_PREFIX=https://collector.example.com                  │
//! │     FOOTFALL_STORAGE=false                                             │
//! │                                                                         │
//! │  3. TOML Config File                                                   │
//! │     ~/.config/footfall/footfall.toml (Linux)                           │
//! │     ~/Library/Application Support/com.footfall.footfall/... (macOS)    │
//! │                                                                         │
//! │  4. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A loaded configuration is frozen into an `Arc<TrackerConfig>` snapshot.
//! Reconfiguring builds a whole new snapshot; nothing mutates one in place.
//!
//! ## Configuration File Format
//! ```toml
//! [endpoint]
//! url_prefix = "https://collector.example.com"
//! visits_url = "/footfall/visits"
//! events_url = "/footfall/events"
//! with_credentials = false
//!
//! [endpoint.headers]
//! Authorization = "Bearer abc"
//!
//! [tracking]
//! platform = "Web"
//! use_beacon = true
//! keep_alive = false
//!
//! [tracking.visit_params]
//! campaign = "spring"
//!
//! [storage]
//! enabled = true
//! visit_minutes = 240
//! visitor_minutes = 1051200
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use footfall_core::validation::{validate_endpoint_path, validate_positive};
use footfall_core::Properties;

use crate::error::{TrackerError, TrackerResult};

/// Upper bound for any configured duration in minutes (100 years).
const MAX_MINUTES: u64 = 100 * 365 * 24 * 60;

// =============================================================================
// Endpoint Settings
// =============================================================================

/// Where and how requests are sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// Prepended to both endpoint paths. Empty means "relative to the host's
    /// origin".
    #[serde(default)]
    pub url_prefix: String,

    /// Session-creation path.
    #[serde(default = "default_visits_url")]
    pub visits_url: String,

    /// Event delivery path.
    #[serde(default = "default_events_url")]
    pub events_url: String,

    /// Send requests with credentials. Forces the acknowledged transport.
    #[serde(default)]
    pub with_credentials: bool,

    /// Per-request timeout for the acknowledged transport (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Extra request headers. Any header forces the acknowledged transport.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_visits_url() -> String {
    "/footfall/visits".to_string()
}

fn default_events_url() -> String {
    "/footfall/events".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for EndpointSettings {
    fn default() -> Self {
        EndpointSettings {
            url_prefix: String::new(),
            visits_url: default_visits_url(),
            events_url: default_events_url(),
            with_credentials: false,
            request_timeout_secs: default_request_timeout(),
            headers: BTreeMap::new(),
        }
    }
}

impl EndpointSettings {
    /// Full session-creation URL.
    pub fn visits_endpoint(&self) -> String {
        format!("{}{}", self.url_prefix, self.visits_url)
    }

    /// Full event delivery URL.
    pub fn events_endpoint(&self) -> String {
        format!("{}{}", self.url_prefix, self.events_url)
    }
}

// =============================================================================
// Tracking Settings
// =============================================================================

/// What gets tracked and how events leave the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Platform label sent with new visits.
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Page name for `$view` and interaction events. Defaults to the host's
    /// current path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,

    /// Prefer the fire-and-forget transport when it is usable.
    #[serde(default = "default_true")]
    pub use_beacon: bool,

    /// Start establishing a session as soon as the tracker is spawned.
    #[serde(default = "default_true")]
    pub start_on_ready: bool,

    /// Create visits on the collector.
    #[serde(default = "default_true")]
    pub track_visits: bool,

    /// Extend the visit expiry every time an active visit is resumed.
    #[serde(default)]
    pub keep_alive: bool,

    /// Delay before an acknowledged delivery is attempted (milliseconds).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Extra fields merged into every session-creation payload.
    #[serde(default)]
    pub visit_params: Properties,
}

fn default_platform() -> String {
    "Web".to_string()
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    1000
}

impl Default for TrackingSettings {
    fn default() -> Self {
        TrackingSettings {
            platform: default_platform(),
            page: None,
            use_beacon: true,
            start_on_ready: true,
            track_visits: true,
            keep_alive: false,
            debounce_ms: default_debounce_ms(),
            visit_params: Properties::new(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Identity persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Persist identity and the event queue. When off, events still go out
    /// but carry no tokens and do not survive a restart.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scope override applied to every entry written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// SQLite file used by file-backed hosts. Defaults to the platform data
    /// directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Visit token lifetime.
    #[serde(default = "default_visit_minutes")]
    pub visit_minutes: u64,

    /// Visitor token lifetime.
    #[serde(default = "default_visitor_minutes")]
    pub visitor_minutes: u64,

    /// Lifetime of the persisted event queue snapshot.
    #[serde(default = "default_queue_minutes")]
    pub queue_minutes: u64,
}

fn default_visit_minutes() -> u64 {
    4 * 60
}

fn default_visitor_minutes() -> u64 {
    2 * 365 * 24 * 60
}

fn default_queue_minutes() -> u64 {
    1
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            enabled: true,
            domain: None,
            database_path: None,
            visit_minutes: default_visit_minutes(),
            visitor_minutes: default_visitor_minutes(),
            queue_minutes: default_queue_minutes(),
        }
    }
}

// =============================================================================
// Runtime Overrides
// =============================================================================

/// Caller-supplied overrides; every field is optional.
///
/// ## Example
/// ```rust,ignore
/// handle.configure(ConfigOverrides {
///     url_prefix: Some("https://collector.example.com".into()),
///     use_beacon: Some(false),
///     ..Default::default()
/// }).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub url_prefix: Option<String>,
    pub visits_url: Option<String>,
    pub events_url: Option<String>,
    pub page: Option<String>,
    pub platform: Option<String>,
    pub use_beacon: Option<bool>,
    pub start_on_ready: Option<bool>,
    pub track_visits: Option<bool>,
    pub storage: Option<bool>,
    pub storage_domain: Option<String>,
    pub with_credentials: Option<bool>,
    pub headers: Option<BTreeMap<String, String>>,
    pub visit_params: Option<Properties>,
    pub keep_alive: Option<bool>,
    pub visit_minutes: Option<u64>,
    pub visitor_minutes: Option<u64>,
    pub debounce_ms: Option<u64>,
}

// =============================================================================
// Main Tracker Configuration
// =============================================================================

/// Complete tracker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub endpoint: EndpointSettings,

    #[serde(default)]
    pub tracking: TrackingSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl TrackerConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (footfall.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> TrackerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading tracker config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load tracker config, using defaults");
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> TrackerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| TrackerError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Tracker config saved");
        Ok(())
    }

    /// Returns a new snapshot with the overrides applied.
    pub fn merged(&self, overrides: &ConfigOverrides) -> TrackerConfig {
        let mut next = self.clone();
        let o = overrides.clone();

        if let Some(v) = o.url_prefix {
            next.endpoint.url_prefix = v;
        }
        if let Some(v) = o.visits_url {
            next.endpoint.visits_url = v;
        }
        if let Some(v) = o.events_url {
            next.endpoint.events_url = v;
        }
        if let Some(v) = o.with_credentials {
            next.endpoint.with_credentials = v;
        }
        if let Some(v) = o.headers {
            next.endpoint.headers = v;
        }
        if let Some(v) = o.page {
            next.tracking.page = Some(v);
        }
        if let Some(v) = o.platform {
            next.tracking.platform = v;
        }
        if let Some(v) = o.use_beacon {
            next.tracking.use_beacon = v;
        }
        if let Some(v) = o.start_on_ready {
            next.tracking.start_on_ready = v;
        }
        if let Some(v) = o.track_visits {
            next.tracking.track_visits = v;
        }
        if let Some(v) = o.keep_alive {
            next.tracking.keep_alive = v;
        }
        if let Some(v) = o.visit_params {
            next.tracking.visit_params = v;
        }
        if let Some(v) = o.debounce_ms {
            next.tracking.debounce_ms = v;
        }
        if let Some(v) = o.storage {
            next.storage.enabled = v;
        }
        if let Some(v) = o.storage_domain {
            next.storage.domain = Some(v);
        }
        if let Some(v) = o.visit_minutes {
            next.storage.visit_minutes = v;
        }
        if let Some(v) = o.visitor_minutes {
            next.storage.visitor_minutes = v;
        }

        next
    }

    /// Validates the configuration.
    pub fn validate(&self) -> TrackerResult<()> {
        let prefix = &self.endpoint.url_prefix;
        if !prefix.is_empty() {
            let parsed = url::Url::parse(prefix)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(TrackerError::InvalidUrl(format!(
                    "url_prefix must be an http(s) URL, got: {}",
                    prefix
                )));
            }
        }

        validate_endpoint_path("visits_url", &self.endpoint.visits_url)?;
        validate_endpoint_path("events_url", &self.endpoint.events_url)?;

        if self.endpoint.request_timeout_secs == 0 {
            return Err(TrackerError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        validate_positive("visit_minutes", self.storage.visit_minutes, MAX_MINUTES)?;
        validate_positive("visitor_minutes", self.storage.visitor_minutes, MAX_MINUTES)?;
        validate_positive("queue_minutes", self.storage.queue_minutes, MAX_MINUTES)?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(prefix) = std::env::var("FOOTFALL_URL_PREFIX") {
            debug!(url_prefix = %prefix, "Overriding url_prefix from environment");
            self.endpoint.url_prefix = prefix;
        }

        if let Ok(platform) = std::env::var("FOOTFALL_PLATFORM") {
            self.tracking.platform = platform;
        }

        let flags: [(&str, &mut bool); 4] = [
            ("FOOTFALL_USE_BEACON", &mut self.tracking.use_beacon),
            ("FOOTFALL_STORAGE", &mut self.storage.enabled),
            ("FOOTFALL_TRACK_VISITS", &mut self.tracking.track_visits),
            ("FOOTFALL_KEEP_ALIVE", &mut self.tracking.keep_alive),
        ];

        for (var, slot) in flags {
            if let Ok(raw) = std::env::var(var) {
                match parse_flag(&raw) {
                    Some(value) => *slot = value,
                    None => warn!(var, value = %raw, "Ignoring unparseable flag in environment"),
                }
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "footfall", "footfall")
            .map(|dirs| dirs.config_dir().join("footfall.toml"))
    }

    /// Returns the SQLite path: configured, else the platform data directory.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage.database_path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "footfall", "footfall")
                .map(|dirs| dirs.data_dir().join("footfall.db"))
        })
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn visit_ttl(&self) -> Duration {
        minutes(self.storage.visit_minutes)
    }

    pub fn visitor_ttl(&self) -> Duration {
        minutes(self.storage.visitor_minutes)
    }

    pub fn queue_ttl(&self) -> Duration {
        minutes(self.storage.queue_minutes)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.tracking.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.request_timeout_secs)
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

/// Parses the usual spellings of a boolean flag.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
