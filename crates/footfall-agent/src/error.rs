//! # Tracker Error Types
//!
//! Error types for tracker operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tracker Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  RequestFailed  │  │  SerializationFailed    │ │
//! │  │  InvalidUrl     │  │  Rejected       │  │                         │ │
//! │  │  Validation     │  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐  │
//! │  │    Storage      │  │     Internal                                │  │
//! │  │                 │  │                                             │  │
//! │  │  StorageFailed  │  │  ShuttingDown, ChannelError, Internal       │  │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  Only configuration/usage errors reach callers. Everything on the      │
//! │  telemetry path is logged and absorbed by the tracker.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use footfall_core::{CoreError, ValidationError};

/// Result type alias for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Tracker error type.
#[derive(Debug, Error)]
pub enum TrackerError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid tracker configuration.
    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    /// Invalid endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Caller input rejected (e.g. a binding helper without a selector).
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Persistent storage rejected a read or write.
    #[error("Storage error: {0}")]
    StorageFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The request never produced a response.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The collector answered with a non-2xx status.
    #[error("Collector rejected request with status {status}")]
    Rejected { status: u16 },

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// A payload could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal tracker error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The tracker task has stopped.
    #[error("Tracker is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for TrackerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Serialization(msg) => TrackerError::SerializationFailed(msg),
            CoreError::Validation(v) => TrackerError::Validation(v),
        }
    }
}

impl From<footfall_db::DbError> for TrackerError {
    fn from(err: footfall_db::DbError) -> Self {
        TrackerError::StorageFailed(err.to_string())
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for TrackerError {
    fn from(err: url::ParseError) -> Self {
        TrackerError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackerError::Timeout
        } else if let Some(status) = err.status() {
            TrackerError::Rejected {
                status: status.as_u16(),
            }
        } else {
            TrackerError::RequestFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for TrackerError {
    fn from(err: toml::de::Error) -> Self {
        TrackerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for TrackerError {
    fn from(err: toml::ser::Error) -> Self {
        TrackerError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl TrackerError {
    /// Returns true if the same request might succeed in a later lifetime.
    ///
    /// The tracker never retries in-process; this drives how loudly a failed
    /// delivery is logged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::RequestFailed(_)
                | TrackerError::Timeout
                | TrackerError::StorageFailed(_)
        ) || matches!(self, TrackerError::Rejected { status } if *status >= 500 || *status == 429)
    }

    /// Returns true if this error indicates a configuration or usage problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TrackerError::InvalidConfig(_)
                | TrackerError::InvalidUrl(_)
                | TrackerError::Validation(_)
                | TrackerError::ConfigLoadFailed(_)
                | TrackerError::ConfigSaveFailed(_)
        )
    }
}
