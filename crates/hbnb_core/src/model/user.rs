//! User entity.
//!
//! # Invariants
//! - `email` is well-formed; uniqueness (case-sensitive, as stored) is a
//!   cross-entity rule enforced by the data manager.
//! - `password` is an opaque credential and never appears in `Debug` output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

use crate::model::entity::{Entity, EntityKind};
use crate::model::identity::{EntityId, Identity};
use crate::model::validation::{require_text, ValidationError};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    identity: Identity,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    city_id: Option<EntityId>,
    country_id: Option<EntityId>,
}

/// Input for registering a user.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub city_id: Option<EntityId>,
    pub country_id: Option<EntityId>,
}

/// Partial update for a user. `None` keeps the current value; references
/// are removed with `User::clear_city` / `User::clear_country`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city_id: Option<EntityId>,
    pub country_id: Option<EntityId>,
}

impl User {
    pub fn new(input: NewUser) -> Result<Self, ValidationError> {
        Ok(Self {
            identity: Identity::new(),
            email: normalize_email(input.email)?,
            password: require_credential(input.password)?,
            first_name: require_text("first_name", input.first_name)?,
            last_name: require_text("last_name", input.last_name)?,
            city_id: input.city_id,
            country_id: input.country_id,
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn city_id(&self) -> Option<EntityId> {
        self.city_id
    }

    pub fn country_id(&self) -> Option<EntityId> {
        self.country_id
    }

    /// Applies a partial update. Nothing changes when validation fails.
    pub fn update_details(&mut self, update: UserUpdate) -> Result<(), ValidationError> {
        let email = update.email.map(normalize_email).transpose()?;
        let password = update.password.map(require_credential).transpose()?;
        let first_name = update
            .first_name
            .map(|value| require_text("first_name", value))
            .transpose()?;
        let last_name = update
            .last_name
            .map(|value| require_text("last_name", value))
            .transpose()?;

        if let Some(email) = email {
            self.email = email;
        }
        if let Some(password) = password {
            self.password = password;
        }
        if let Some(first_name) = first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = last_name {
            self.last_name = last_name;
        }
        if update.city_id.is_some() {
            self.city_id = update.city_id;
        }
        if update.country_id.is_some() {
            self.country_id = update.country_id;
        }
        self.identity.touch();
        Ok(())
    }

    /// Drops the city reference. `UserUpdate` can only set it.
    pub fn clear_city(&mut self) {
        self.city_id = None;
        self.identity.touch();
    }

    /// Drops the country reference. `UserUpdate` can only set it.
    pub fn clear_country(&mut self) {
        self.country_id = None;
        self.identity.touch();
    }
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.identity.validate()?;
        if !EMAIL_RE.is_match(&self.email) {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        if self.password.is_empty() {
            return Err(ValidationError::BlankField("password"));
        }
        require_text("first_name", self.first_name.clone())?;
        require_text("last_name", self.last_name.clone())?;
        Ok(())
    }
}

impl Debug for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("identity", &self.identity)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("city_id", &self.city_id)
            .field("country_id", &self.country_id)
            .finish()
    }
}

impl Debug for NewUser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("city_id", &self.city_id)
            .field("country_id", &self.country_id)
            .finish()
    }
}

impl Debug for UserUpdate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserUpdate")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("city_id", &self.city_id)
            .field("country_id", &self.country_id)
            .finish()
    }
}

fn normalize_email(email: String) -> Result<String, ValidationError> {
    let trimmed = email.trim();
    if !EMAIL_RE.is_match(trimmed) {
        return Err(ValidationError::InvalidEmail(email));
    }
    Ok(trimmed.to_string())
}

fn require_credential(password: String) -> Result<String, ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::BlankField("password"));
    }
    Ok(password)
}
