//! Use-case layer over a `Store`.
//!
//! # Responsibility
//! - Enforce cross-entity invariants before writes reach storage.
//! - Own the delete policy and the locking discipline.

pub mod data_manager;
pub mod integrity;
