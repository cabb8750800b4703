//! Store contracts and storage backends.
//!
//! # Responsibility
//! - Define the backend-agnostic `Store` capability set.
//! - Convert typed entities to flat records and back.
//!
//! # Invariants
//! - Records are flat attribute bags; references are ids, never nested records.
//! - `apply` is all-or-nothing: either every op in the batch becomes visible
//!   (and durable, for durable backends) or none does.
//! - Loading a missing id is `Ok(None)`, never an error.
//! - Loaded records are re-validated; invalid persisted state is rejected.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::model::validation::ValidationError;
use crate::model::{Entity, EntityId, EntityKind};

pub mod document;
pub mod file_store;
pub mod memory_store;

/// Flat serialized form of one entity.
pub type Record = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    /// Durable read or write failed.
    Io {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize(serde_json::Error),
    /// Entity rejected before it reached the backend.
    Validation(ValidationError),
    /// Persisted state cannot be turned back into a valid entity.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { op, path, source } => {
                write!(f, "{op} failed for `{}`: {source}", path.display())
            }
            Self::Serialize(err) => write!(f, "serialization failed: {err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// One mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert or replace the record stored under `id`.
    Put {
        kind: EntityKind,
        id: EntityId,
        record: Record,
    },
    /// Remove the record if present.
    Remove { kind: EntityKind, id: EntityId },
}

impl WriteOp {
    /// Validates `entity` and converts it to a put operation.
    pub fn put<E: Entity>(entity: &E) -> StoreResult<Self> {
        entity.validate()?;
        Ok(Self::Put {
            kind: E::KIND,
            id: entity.id(),
            record: to_record(entity)?,
        })
    }

    pub fn remove(kind: EntityKind, id: EntityId) -> Self {
        Self::Remove { kind, id }
    }
}

/// Storage backend contract.
///
/// Backends are single-owner: mutation takes `&mut self`, and callers that
/// share a store across threads wrap it in a lock (see `DataManager`).
pub trait Store {
    /// Applies a batch of writes atomically.
    ///
    /// A batch that changes nothing (identical puts, removes of absent ids)
    /// succeeds without touching durable storage.
    fn apply(&mut self, ops: Vec<WriteOp>) -> StoreResult<()>;

    fn load_record(&self, kind: EntityKind, id: EntityId) -> StoreResult<Option<Record>>;

    fn load_all_records(&self, kind: EntityKind) -> StoreResult<Vec<Record>>;

    /// Number of stored records of `kind`.
    fn count(&self, kind: EntityKind) -> StoreResult<usize> {
        Ok(self.load_all_records(kind)?.len())
    }

    /// Upserts one entity by id.
    fn save<E: Entity>(&mut self, entity: &E) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.apply(vec![WriteOp::put(entity)?])
    }

    /// Removes one entity; absent ids are a no-op.
    fn delete(&mut self, kind: EntityKind, id: EntityId) -> StoreResult<()> {
        self.apply(vec![WriteOp::remove(kind, id)])
    }

    fn load<E: Entity>(&self, id: EntityId) -> StoreResult<Option<E>>
    where
        Self: Sized,
    {
        self.load_record(E::KIND, id)?
            .map(|record| from_record::<E>(id, record))
            .transpose()
    }

    fn load_all<E: Entity>(&self) -> StoreResult<Vec<E>>
    where
        Self: Sized,
    {
        self.load_all_records(E::KIND)?
            .into_iter()
            .map(|record| {
                let id = record_id(E::KIND, &record)?;
                from_record::<E>(id, record)
            })
            .collect()
    }
}

/// Serializes an entity to its flat record.
pub fn to_record<E: Entity>(entity: &E) -> StoreResult<Record> {
    match serde_json::to_value(entity)? {
        Value::Object(record) => Ok(record),
        other => Err(StoreError::InvalidData(format!(
            "{} serialized to non-object value `{other}`",
            E::KIND
        ))),
    }
}

/// Rebuilds an entity from the record stored under `id`.
pub fn from_record<E: Entity>(id: EntityId, record: Record) -> StoreResult<E> {
    let entity: E = serde_json::from_value(Value::Object(record)).map_err(|err| {
        StoreError::InvalidData(format!("cannot decode {} {id}: {err}", E::KIND))
    })?;
    if entity.id() != id {
        return Err(StoreError::InvalidData(format!(
            "{} stored under {id} carries id {}",
            E::KIND,
            entity.id()
        )));
    }
    entity.validate().map_err(|err| {
        StoreError::InvalidData(format!("{} {id} failed validation: {err}", E::KIND))
    })?;
    Ok(entity)
}

/// Reads the `id` attribute of a stored record.
pub(crate) fn record_id(kind: EntityKind, record: &Record) -> StoreResult<EntityId> {
    let text = record
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidData(format!("{kind} record without string `id`")))?;
    EntityId::parse_str(text)
        .map_err(|_| StoreError::InvalidData(format!("invalid {kind} id `{text}`")))
}
