//! Persistence and domain core for the HBnB reservation marketplace.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::{ConfigError, CoreConfig, ManagerOptions, StoreOptions};
pub use error::{ConflictError, DataError, DataResult, Dependent};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::amenity::{Amenity, AmenityUpdate};
pub use model::city::{City, CityUpdate};
pub use model::country::Country;
pub use model::place::{NewPlace, Place, PlaceUpdate};
pub use model::review::{Review, ReviewUpdate};
pub use model::user::{NewUser, User, UserUpdate};
pub use model::validation::ValidationError;
pub use model::{Entity, EntityId, EntityKind, Identity};
pub use service::data_manager::DataManager;
pub use service::integrity::DeleteMode;
pub use store::file_store::FileStore;
pub use store::memory_store::MemoryStore;
pub use store::{Record, Store, StoreError, StoreResult, WriteOp};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
