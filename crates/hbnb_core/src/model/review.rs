//! Review entity.
//!
//! # Invariants
//! - `rating` is an integer in `1..=5`.
//! - The author is never the host of the reviewed place; that check
//!   needs the place record and runs in the data manager.

use serde::{Deserialize, Serialize};

use crate::model::entity::{Entity, EntityKind};
use crate::model::identity::{EntityId, Identity};
use crate::model::validation::ValidationError;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(flatten)]
    identity: Identity,
    place_id: EntityId,
    user_id: EntityId,
    rating: u8,
    #[serde(default)]
    comment: String,
}

/// Partial update for a review. Place and author are fixed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewUpdate {
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

impl Review {
    pub fn new(
        place_id: EntityId,
        user_id: EntityId,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        check_rating(rating)?;
        Ok(Self {
            identity: Identity::new(),
            place_id,
            user_id,
            rating,
            comment: comment.into().trim().to_string(),
        })
    }

    pub fn place_id(&self) -> EntityId {
        self.place_id
    }

    pub fn user_id(&self) -> EntityId {
        self.user_id
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn update_details(&mut self, update: ReviewUpdate) -> Result<(), ValidationError> {
        if let Some(rating) = update.rating {
            check_rating(rating)?;
            self.rating = rating;
        }
        if let Some(comment) = update.comment {
            self.comment = comment.trim().to_string();
        }
        self.identity.touch();
        Ok(())
    }
}

impl Entity for Review {
    const KIND: EntityKind = EntityKind::Review;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.identity.validate()?;
        check_rating(self.rating)
    }
}

fn check_rating(rating: u8) -> Result<(), ValidationError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ValidationError::RatingOutOfRange(rating));
    }
    Ok(())
}
