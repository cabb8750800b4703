//! Identity and timestamp base shared by every entity.
//!
//! # Invariants
//! - `id` is a random UUID v4 and never changes after creation.
//! - `created_at` is set once.
//! - `updated_at` never moves backwards, even if the wall clock does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::validation::ValidationError;

/// Stable identifier for every persisted entity.
pub type EntityId = Uuid;

/// Creation contract embedded (flattened) in every entity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: EntityId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Identity {
    /// Allocates a fresh id with `updated_at == created_at == now`.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Refreshes `updated_at` after a mutation.
    pub fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    pub(crate) fn touch_at(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.updated_at < self.created_at {
            return Err(ValidationError::TimestampsOutOfOrder);
        }
        Ok(())
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}
