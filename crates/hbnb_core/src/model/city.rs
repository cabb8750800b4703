//! City entity.

use serde::{Deserialize, Serialize};

use crate::model::entity::{Entity, EntityKind};
use crate::model::identity::{EntityId, Identity};
use crate::model::validation::{require_text, ValidationError};

/// City record. `country_id` must resolve; the data manager checks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    #[serde(flatten)]
    identity: Identity,
    name: String,
    country_id: EntityId,
}

/// Partial update for a city. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityUpdate {
    pub name: Option<String>,
    pub country_id: Option<EntityId>,
}

impl City {
    pub fn new(name: impl Into<String>, country_id: EntityId) -> Result<Self, ValidationError> {
        Ok(Self {
            identity: Identity::new(),
            name: require_text("name", name.into())?,
            country_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn country_id(&self) -> EntityId {
        self.country_id
    }

    /// Applies a partial update. Nothing changes when validation fails.
    pub fn update_details(&mut self, update: CityUpdate) -> Result<(), ValidationError> {
        let name = update
            .name
            .map(|value| require_text("name", value))
            .transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(country_id) = update.country_id {
            self.country_id = country_id;
        }
        self.identity.touch();
        Ok(())
    }
}

impl Entity for City {
    const KIND: EntityKind = EntityKind::City;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.identity.validate()?;
        require_text("name", self.name.clone())?;
        Ok(())
    }
}
