//! Enumerated entity kinds and the common entity contract.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::model::identity::{EntityId, Identity};
use crate::model::validation::ValidationError;

/// Closed set of persisted entity types.
///
/// Serialized names double as the bucket keys of the persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Place,
    Review,
    Amenity,
    City,
    Country,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::User,
        EntityKind::Place,
        EntityKind::Review,
        EntityKind::Amenity,
        EntityKind::City,
        EntityKind::Country,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Place => "Place",
            Self::Review => "Review",
            Self::Amenity => "Amenity",
            Self::City => "City",
            Self::Country => "Country",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract implemented by every persisted entity.
///
/// # Invariants
/// - `KIND` selects the storage bucket; it is fixed per type.
/// - `validate()` covers local invariants only. Cross-entity checks
///   (uniqueness, reference resolution) belong to the data manager.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    const KIND: EntityKind;

    fn identity(&self) -> &Identity;

    fn id(&self) -> EntityId {
        self.identity().id()
    }

    fn validate(&self) -> Result<(), ValidationError>;
}
