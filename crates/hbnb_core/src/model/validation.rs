//! Attribute-level validation errors shared by all entities.
//!
//! # Responsibility
//! - Describe malformed or out-of-range attribute values.
//! - Stay free of storage and cross-entity concerns.

use crate::model::{EntityId, EntityKind};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Malformed or out-of-range attribute, or a reference that does not resolve.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required text attribute is blank after trim.
    BlankField(&'static str),
    /// Country code is not a known ISO 3166-1 alpha-2 code.
    InvalidCountryCode(String),
    /// Email does not look like `local@domain.tld`.
    InvalidEmail(String),
    /// Review rating outside `1..=5`.
    RatingOutOfRange(u8),
    /// Latitude outside `[-90, 90]` or not finite.
    LatitudeOutOfRange(f64),
    /// Longitude outside `[-180, 180]` or not finite.
    LongitudeOutOfRange(f64),
    /// Price per night is negative or not finite.
    InvalidPrice(f64),
    /// Referenced entity does not exist.
    UnresolvedReference {
        field: &'static str,
        kind: EntityKind,
        id: EntityId,
    },
    /// Persisted timestamps are out of order.
    TimestampsOutOfOrder,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::InvalidCountryCode(code) => {
                write!(f, "invalid ISO 3166-1 alpha-2 code: `{code}`")
            }
            // The address itself is caller data; keep it out of the message.
            Self::InvalidEmail(_) => write!(f, "email address is not well-formed"),
            Self::RatingOutOfRange(value) => {
                write!(f, "rating must be between 1 and 5, got {value}")
            }
            Self::LatitudeOutOfRange(value) => {
                write!(f, "latitude must be within [-90, 90], got {value}")
            }
            Self::LongitudeOutOfRange(value) => {
                write!(f, "longitude must be within [-180, 180], got {value}")
            }
            Self::InvalidPrice(value) => {
                write!(f, "price per night must be a non-negative amount, got {value}")
            }
            Self::UnresolvedReference { field, kind, id } => {
                write!(f, "`{field}` references missing {kind} {id}")
            }
            Self::TimestampsOutOfOrder => write!(f, "updated_at must be >= created_at"),
        }
    }
}

impl Error for ValidationError {}

/// Trims `value` and rejects it when nothing is left.
pub(crate) fn require_text(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    if trimmed.len() == value.len() {
        return Ok(value);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{require_text, ValidationError};

    #[test]
    fn require_text_trims_surrounding_whitespace() {
        assert_eq!(require_text("name", "  Lisbon ".to_string()).unwrap(), "Lisbon");
    }

    #[test]
    fn require_text_rejects_whitespace_only() {
        let err = require_text("name", " \t ".to_string()).unwrap_err();
        assert_eq!(err, ValidationError::BlankField("name"));
    }

    #[test]
    fn invalid_email_message_does_not_echo_input() {
        let err = ValidationError::InvalidEmail("secret@nowhere".to_string());
        assert!(!err.to_string().contains("secret"));
    }
}
