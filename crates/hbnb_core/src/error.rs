//! Core error taxonomy returned to callers of the data manager.
//!
//! # Responsibility
//! - Separate caller errors (validation, conflict, integrity, not found)
//!   from storage failures and lock contention.
//! - Keep transport concerns out: mapping to status codes is the caller's job.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::model::validation::ValidationError;
use crate::model::{EntityId, EntityKind};
use crate::store::StoreError;

pub type DataResult<T> = Result<T, DataError>;

/// Uniqueness or ownership violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// Another user already registered this email.
    DuplicateEmail,
    /// Another country already uses this ISO code.
    DuplicateCountryCode(String),
    /// Another amenity already uses this name.
    DuplicateAmenityName(String),
    /// The place already has a different host.
    HostAlreadyAssigned {
        place_id: EntityId,
        host_id: EntityId,
    },
    /// The place host tried to review their own place.
    HostCannotReview {
        place_id: EntityId,
        user_id: EntityId,
    },
    /// The candidate host has already reviewed the place.
    ReviewerCannotHost {
        place_id: EntityId,
        user_id: EntityId,
    },
}

impl Display for ConflictError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEmail => write!(f, "email is already registered"),
            Self::DuplicateCountryCode(code) => {
                write!(f, "country code already in use: {code}")
            }
            Self::DuplicateAmenityName(name) => {
                write!(f, "amenity name already in use: {name}")
            }
            Self::HostAlreadyAssigned { place_id, host_id } => {
                write!(f, "place {place_id} already has host {host_id}")
            }
            Self::HostCannotReview { place_id, user_id } => {
                write!(f, "user {user_id} hosts place {place_id} and cannot review it")
            }
            Self::ReviewerCannotHost { place_id, user_id } => {
                write!(f, "user {user_id} has reviewed place {place_id} and cannot host it")
            }
        }
    }
}

impl Error for ConflictError {}

/// Record that still references an entity targeted for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Dependent {
    pub kind: EntityKind,
    pub id: EntityId,
}

/// Error returned by data manager operations.
#[derive(Debug)]
pub enum DataError {
    Validation(ValidationError),
    Conflict(ConflictError),
    /// Delete blocked because other records still reference the target.
    ReferentialIntegrity {
        kind: EntityKind,
        id: EntityId,
        dependents: Vec<Dependent>,
    },
    /// A mutation targeted an id that does not exist.
    ///
    /// Reads never produce this; they return `None` instead.
    NotFound { kind: EntityKind, id: EntityId },
    Storage(StoreError),
    /// Lock was not acquired within the configured wait.
    Busy { waited: Duration },
}

impl Display for DataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::Conflict(err) => write!(f, "conflict: {err}"),
            Self::ReferentialIntegrity {
                kind,
                id,
                dependents,
            } => write!(
                f,
                "cannot delete {kind} {id}: still referenced by {} record(s)",
                dependents.len()
            ),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
            Self::Busy { waited } => write!(
                f,
                "store is busy; lock not acquired after {} ms",
                waited.as_millis()
            ),
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Conflict(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::ReferentialIntegrity { .. } | Self::NotFound { .. } | Self::Busy { .. } => None,
        }
    }
}

impl From<ValidationError> for DataError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ConflictError> for DataError {
    fn from(value: ConflictError) -> Self {
        Self::Conflict(value)
    }
}

impl From<StoreError> for DataError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(err) => Self::Validation(err),
            other => Self::Storage(other),
        }
    }
}

impl DataError {
    /// Short stable code for log lines and caller-side mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::ReferentialIntegrity { .. } => "referential_integrity",
            Self::NotFound { .. } => "not_found",
            Self::Storage(_) => "storage_io",
            Self::Busy { .. } => "busy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConflictError, DataError};
    use crate::model::validation::ValidationError;
    use crate::store::StoreError;
    use std::error::Error;

    #[test]
    fn store_validation_surfaces_as_validation() {
        let err = DataError::from(StoreError::Validation(ValidationError::RatingOutOfRange(9)));
        assert!(matches!(err, DataError::Validation(_)));
        assert_eq!(err.code(), "validation");
    }

    #[test]
    fn conflict_keeps_source_chain() {
        let err = DataError::from(ConflictError::DuplicateEmail);
        assert!(err.source().is_some());
        assert!(!err.to_string().contains('@'));
    }
}
