//! Place (listing) entity.
//!
//! # Responsibility
//! - Hold listing attributes and id references to city, host and amenities.
//! - Enforce numeric ranges and host immutability locally.
//!
//! # Invariants
//! - `host_id`, once set, never changes for the place lifetime.
//! - `price_per_night` is finite and `>= 0`; counts are unsigned.
//! - `latitude` in `[-90, 90]`, `longitude` in `[-180, 180]`.
//! - `amenity_ids` mirrors `Amenity::place_ids`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ConflictError;
use crate::model::entity::{Entity, EntityKind};
use crate::model::identity::{EntityId, Identity};
use crate::model::validation::{require_text, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(flatten)]
    identity: Identity,
    name: String,
    description: String,
    address: String,
    latitude: f64,
    longitude: f64,
    city_id: EntityId,
    host_id: Option<EntityId>,
    number_of_rooms: u32,
    number_of_bathrooms: u32,
    price_per_night: f64,
    max_guests: u32,
    #[serde(default)]
    amenity_ids: BTreeSet<EntityId>,
}

/// Input for listing a new place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPlace {
    pub name: String,
    pub description: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city_id: EntityId,
    pub host_id: Option<EntityId>,
    pub number_of_rooms: u32,
    pub number_of_bathrooms: u32,
    pub price_per_night: f64,
    pub max_guests: u32,
    pub amenity_ids: BTreeSet<EntityId>,
}

/// Partial update for a place.
///
/// Host and amenities are not part of it: they change through
/// `assign_host` and the amenity attach/detach operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city_id: Option<EntityId>,
    pub number_of_rooms: Option<u32>,
    pub number_of_bathrooms: Option<u32>,
    pub price_per_night: Option<f64>,
    pub max_guests: Option<u32>,
}

impl Place {
    pub fn new(input: NewPlace) -> Result<Self, ValidationError> {
        let place = Self {
            identity: Identity::new(),
            name: require_text("name", input.name)?,
            description: input.description.trim().to_string(),
            address: input.address.trim().to_string(),
            latitude: input.latitude,
            longitude: input.longitude,
            city_id: input.city_id,
            host_id: input.host_id,
            number_of_rooms: input.number_of_rooms,
            number_of_bathrooms: input.number_of_bathrooms,
            price_per_night: input.price_per_night,
            max_guests: input.max_guests,
            amenity_ids: input.amenity_ids,
        };
        place.validate()?;
        Ok(place)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn city_id(&self) -> EntityId {
        self.city_id
    }

    pub fn host_id(&self) -> Option<EntityId> {
        self.host_id
    }

    pub fn number_of_rooms(&self) -> u32 {
        self.number_of_rooms
    }

    pub fn number_of_bathrooms(&self) -> u32 {
        self.number_of_bathrooms
    }

    pub fn price_per_night(&self) -> f64 {
        self.price_per_night
    }

    pub fn max_guests(&self) -> u32 {
        self.max_guests
    }

    pub fn amenity_ids(&self) -> &BTreeSet<EntityId> {
        &self.amenity_ids
    }

    /// Applies a partial update. Nothing changes when validation fails.
    pub fn update_details(&mut self, update: PlaceUpdate) -> Result<(), ValidationError> {
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = require_text("name", name)?;
        }
        if let Some(description) = update.description {
            next.description = description.trim().to_string();
        }
        if let Some(address) = update.address {
            next.address = address.trim().to_string();
        }
        if let Some(latitude) = update.latitude {
            next.latitude = latitude;
        }
        if let Some(longitude) = update.longitude {
            next.longitude = longitude;
        }
        if let Some(city_id) = update.city_id {
            next.city_id = city_id;
        }
        if let Some(rooms) = update.number_of_rooms {
            next.number_of_rooms = rooms;
        }
        if let Some(bathrooms) = update.number_of_bathrooms {
            next.number_of_bathrooms = bathrooms;
        }
        if let Some(price) = update.price_per_night {
            next.price_per_night = price;
        }
        if let Some(max_guests) = update.max_guests {
            next.max_guests = max_guests;
        }
        next.validate()?;
        next.identity.touch();
        *self = next;
        Ok(())
    }

    /// Fixes the host of this place.
    ///
    /// Returns `Ok(false)` when `user_id` is already the host (no-op) and
    /// `Ok(true)` when the host was assigned now.
    ///
    /// # Errors
    /// - `ConflictError::HostAlreadyAssigned` when a different host is set.
    pub fn assign_host(&mut self, user_id: EntityId) -> Result<bool, ConflictError> {
        match self.host_id {
            Some(current) if current == user_id => Ok(false),
            Some(current) => Err(ConflictError::HostAlreadyAssigned {
                place_id: self.identity.id(),
                host_id: current,
            }),
            None => {
                self.host_id = Some(user_id);
                self.identity.touch();
                Ok(true)
            }
        }
    }

    pub(crate) fn attach_amenity(&mut self, amenity_id: EntityId) -> bool {
        let inserted = self.amenity_ids.insert(amenity_id);
        if inserted {
            self.identity.touch();
        }
        inserted
    }

    pub(crate) fn detach_amenity(&mut self, amenity_id: EntityId) -> bool {
        let removed = self.amenity_ids.remove(&amenity_id);
        if removed {
            self.identity.touch();
        }
        removed
    }
}

impl Entity for Place {
    const KIND: EntityKind = EntityKind::Place;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.identity.validate()?;
        require_text("name", self.name.clone())?;
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::LatitudeOutOfRange(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::LongitudeOutOfRange(self.longitude));
        }
        if !self.price_per_night.is_finite() || self.price_per_night < 0.0 {
            return Err(ValidationError::InvalidPrice(self.price_per_night));
        }
        Ok(())
    }
}
