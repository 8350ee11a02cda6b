//! # Validation Module
//!
//! Input validation for caller-facing entry points and configuration.
//!
//! ## Usage
//! ```rust
//! use footfall_core::validation::{validate_endpoint_path, validate_selector};
//!
//! assert!(validate_selector(Some("a.button")).is_ok());
//! assert!(validate_selector(None).is_err());
//! assert!(validate_endpoint_path("events_url", "/footfall/events").is_ok());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates the selector handed to a binding helper.
///
/// ## Rules
/// - Must be given
/// - Must not be blank
pub fn validate_selector(selector: Option<&str>) -> ValidationResult<&str> {
    match selector.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ValidationError::Required {
            field: "selector".to_string(),
        }),
    }
}

/// Validates an endpoint path such as `/footfall/visits`.
///
/// ## Rules
/// - Must not be empty
/// - Must start with `/`
/// - Must not contain whitespace
pub fn validate_endpoint_path(field: &str, path: &str) -> ValidationResult<()> {
    if path.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if !path.starts_with('/') {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must start with '/'".to_string(),
        });
    }

    if path.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a duration expressed in whole minutes (or seconds, or millis).
pub fn validate_positive(field: &str, value: u64, max: u64) -> ValidationResult<()> {
    if value == 0 || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector() {
        assert_eq!(validate_selector(Some(" form.signup ")).unwrap(), "form.signup");
        assert!(validate_selector(Some("   ")).is_err());
        assert!(validate_selector(None).is_err());
    }

    #[test]
    fn test_endpoint_path() {
        assert!(validate_endpoint_path("visits_url", "/footfall/visits").is_ok());
        assert!(validate_endpoint_path("visits_url", "").is_err());
        assert!(validate_endpoint_path("visits_url", "footfall/visits").is_err());
        assert!(validate_endpoint_path("visits_url", "/foot fall").is_err());
    }

    #[test]
    fn test_positive() {
        assert!(validate_positive("visit_minutes", 240, 1_000_000).is_ok());
        assert!(validate_positive("visit_minutes", 0, 1_000_000).is_err());
        assert!(validate_positive("visit_minutes", 2_000_000, 1_000_000).is_err());
    }
}
