//! Amenity entity and its side of the amenity/place association.
//!
//! # Invariants
//! - `place_ids` mirrors `Place::amenity_ids`; the data manager writes
//!   both sides in one durable write.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::entity::{Entity, EntityKind};
use crate::model::identity::{EntityId, Identity};
use crate::model::validation::{require_text, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    #[serde(flatten)]
    identity: Identity,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    place_ids: BTreeSet<EntityId>,
}

/// Partial update for an amenity. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmenityUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Amenity {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            identity: Identity::new(),
            name: require_text("name", name.into())?,
            description: description.into().trim().to_string(),
            place_ids: BTreeSet::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn place_ids(&self) -> &BTreeSet<EntityId> {
        &self.place_ids
    }

    pub fn update_details(&mut self, update: AmenityUpdate) -> Result<(), ValidationError> {
        let name = update
            .name
            .map(|value| require_text("name", value))
            .transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        self.identity.touch();
        Ok(())
    }

    /// Records the association with `place_id`. Returns `false` if already attached.
    pub fn attach_to(&mut self, place_id: EntityId) -> bool {
        let inserted = self.place_ids.insert(place_id);
        if inserted {
            self.identity.touch();
        }
        inserted
    }

    /// Removes the association with `place_id`. Returns `false` if it was not attached.
    pub fn detach_from(&mut self, place_id: EntityId) -> bool {
        let removed = self.place_ids.remove(&place_id);
        if removed {
            self.identity.touch();
        }
        removed
    }
}

impl Entity for Amenity {
    const KIND: EntityKind = EntityKind::Amenity;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.identity.validate()?;
        require_text("name", self.name.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Amenity;
    use uuid::Uuid;

    #[test]
    fn attach_and_detach_report_changes() {
        let mut amenity = Amenity::new("Wi-Fi", "fast").unwrap();
        let place_id = Uuid::new_v4();

        assert!(amenity.attach_to(place_id));
        assert!(!amenity.attach_to(place_id));
        assert!(amenity.place_ids().contains(&place_id));

        assert!(amenity.detach_from(place_id));
        assert!(!amenity.detach_from(place_id));
        assert!(amenity.place_ids().is_empty());
    }

    #[test]
    fn unchanged_attach_keeps_updated_at() {
        let mut amenity = Amenity::new("Pool", "").unwrap();
        let place_id = Uuid::new_v4();
        amenity.attach_to(place_id);
        let stamp = amenity.identity.updated_at();

        amenity.attach_to(place_id);
        assert_eq!(amenity.identity.updated_at(), stamp);
    }
}
