//! In-memory document shared by all store backends.
//!
//! # Responsibility
//! - Hold one bucket per entity kind, each mapping id to a flat record.
//! - Encode/decode the persisted JSON layout
//!   `{"User": {"<id>": {...}}, "Place": {...}, ...}`.
//! - Apply write batches with an undo log so failed persistence can roll back.
//!
//! # Invariants
//! - Every `EntityKind` has a bucket, even when empty.
//! - A record's `id` attribute equals the key it is stored under.

use std::collections::BTreeMap;

use crate::model::{EntityId, EntityKind};
use crate::store::{record_id, Record, StoreError, StoreResult, WriteOp};

#[derive(Debug, Clone, PartialEq)]
pub struct StoreDocument {
    buckets: BTreeMap<EntityKind, BTreeMap<EntityId, Record>>,
}

/// Previous state of every record touched by one applied batch.
#[derive(Debug, Default)]
pub struct UndoLog {
    entries: Vec<(EntityKind, EntityId, Option<Record>)>,
}

impl UndoLog {
    /// True when the batch changed nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl StoreDocument {
    /// Creates a document with an empty bucket for every entity kind.
    pub fn empty() -> Self {
        Self {
            buckets: EntityKind::ALL
                .into_iter()
                .map(|kind| (kind, BTreeMap::new()))
                .collect(),
        }
    }

    /// Decodes the persisted layout. Missing buckets are created empty.
    pub fn from_json(bytes: &[u8]) -> StoreResult<Self> {
        let wire: BTreeMap<String, BTreeMap<String, Record>> = serde_json::from_slice(bytes)
            .map_err(|err| StoreError::InvalidData(format!("unreadable store document: {err}")))?;

        let mut document = Self::empty();
        for (kind_name, records) in wire {
            let kind = parse_kind(&kind_name).ok_or_else(|| {
                StoreError::InvalidData(format!("unknown entity bucket `{kind_name}`"))
            })?;
            let bucket = document.bucket_mut(kind);
            for (key, record) in records {
                let id = EntityId::parse_str(&key).map_err(|_| {
                    StoreError::InvalidData(format!("invalid {kind} key `{key}`"))
                })?;
                if record_id(kind, &record)? != id {
                    return Err(StoreError::InvalidData(format!(
                        "{kind} record stored under `{key}` carries a different id"
                    )));
                }
                bucket.insert(id, record);
            }
        }
        Ok(document)
    }

    /// Encodes the document in the persisted layout.
    pub fn to_json(&self) -> StoreResult<Vec<u8>> {
        let wire: BTreeMap<&'static str, BTreeMap<String, &Record>> = self
            .buckets
            .iter()
            .map(|(kind, records)| {
                let records = records
                    .iter()
                    .map(|(id, record)| (id.to_string(), record))
                    .collect();
                (kind.as_str(), records)
            })
            .collect();
        Ok(serde_json::to_vec_pretty(&wire)?)
    }

    pub fn get(&self, kind: EntityKind, id: EntityId) -> Option<&Record> {
        self.buckets.get(&kind).and_then(|bucket| bucket.get(&id))
    }

    /// Records of `kind`, ordered by id.
    pub fn records(&self, kind: EntityKind) -> Vec<Record> {
        self.buckets
            .get(&kind)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.buckets.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Applies `ops` in order and returns what is needed to revert them.
    pub fn apply(&mut self, ops: Vec<WriteOp>) -> UndoLog {
        let mut undo = UndoLog::default();
        for op in ops {
            match op {
                WriteOp::Put { kind, id, record } => {
                    let bucket = self.bucket_mut(kind);
                    if bucket.get(&id) == Some(&record) {
                        continue;
                    }
                    let previous = bucket.insert(id, record);
                    undo.entries.push((kind, id, previous));
                }
                WriteOp::Remove { kind, id } => {
                    if let Some(previous) = self.bucket_mut(kind).remove(&id) {
                        undo.entries.push((kind, id, Some(previous)));
                    }
                }
            }
        }
        undo
    }

    /// Reverts a batch applied by [`StoreDocument::apply`].
    pub fn rollback(&mut self, undo: UndoLog) {
        for (kind, id, previous) in undo.entries.into_iter().rev() {
            let bucket = self.bucket_mut(kind);
            match previous {
                Some(record) => {
                    bucket.insert(id, record);
                }
                None => {
                    bucket.remove(&id);
                }
            }
        }
    }

    fn bucket_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<EntityId, Record> {
        self.buckets.entry(kind).or_default()
    }
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self::empty()
    }
}

fn parse_kind(value: &str) -> Option<EntityKind> {
    EntityKind::ALL
        .into_iter()
        .find(|kind| kind.as_str() == value)
}
