//! Request validation errors and the field checks shared by the routes

use serde_json::{json, Value};
use thiserror::Error;

/// A single rejected field in a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Field exceeds maximum length in characters
    #[error("{field} exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// List has more entries than allowed
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: &'static str, max: usize },

    /// Number outside the accepted range
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: &'static str, min: u32, max: u32 },

    /// String doesn't match required format
    #[error("{field}: {reason}")]
    InvalidFormat { field: &'static str, reason: &'static str },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty { field }
            | Self::TooLong { field, .. }
            | Self::TooMany { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::InvalidFormat { field, .. } => field,
        }
    }

    /// Machine-readable form placed in the error body's `details`
    pub fn details(&self) -> Value {
        json!({ "field": self.field(), "reason": self.to_string() })
    }
}

/// Non-empty and at most `max` characters
pub fn require_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    max_chars(field, value, max)
}

pub fn max_chars(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub fn in_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange { field, min, max });
    }
    Ok(())
}

/// Absolute http(s) URL. Thumbnails and avatars are rendered as images,
/// so other schemes (`javascript:`, `data:`, `ftp:`) are refused.
pub fn url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    match reqwest::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field,
            reason: "must be an absolute http(s) URL",
        }),
    }
}

/// `#RRGGBB`
pub fn hex_color(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let valid = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field,
            reason: "must be a #RRGGBB hex color",
        });
    }
    Ok(())
}
