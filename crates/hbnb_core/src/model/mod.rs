//! Domain model for the reservation marketplace.
//!
//! # Responsibility
//! - Define the six entity records and their local invariants.
//! - Provide named, validated update operations; no generic setters.
//!
//! # Invariants
//! - Every entity is identified by a stable `EntityId`.
//! - Entities reference each other by id only, never by embedding.
//! - No model operation performs I/O.

pub mod amenity;
pub mod city;
pub mod country;
pub mod entity;
pub mod identity;
pub mod place;
pub mod review;
pub mod user;
pub mod validation;

pub use entity::{Entity, EntityKind};
pub use identity::{EntityId, Identity};
