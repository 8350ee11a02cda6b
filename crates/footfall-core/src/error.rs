//! # Error Types
//!
//! Domain-specific error types for footfall-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  footfall-core errors (this file)                                      │
//! │  ├── CoreError        - Payload and queue (de)serialization            │
//! │  └── ValidationError  - Caller input and configuration checks          │
//! │                                                                         │
//! │  footfall-db errors (separate crate)                                   │
//! │  └── DbError          - Storage operation failures                     │
//! │                                                                         │
//! │  footfall-agent errors                                                 │
//! │  └── TrackerError     - What callers of the Tracker see                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → TrackerError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core lifecycle errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A payload or queue snapshot could not be encoded or decoded.
    ///
    /// ## When This Occurs
    /// - A persisted queue snapshot was truncated or hand-edited
    /// - A property value cannot be represented as JSON
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are programming errors on the caller's side (a binding helper called
/// without a selector, a malformed endpoint path) and are surfaced immediately.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., endpoint path without a leading slash).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: u64, max: u64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
