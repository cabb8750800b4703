//! Non-durable in-memory store.
//!
//! Same contract as `FileStore` minus durability; state is lost on drop.

use crate::model::{EntityId, EntityKind};
use crate::store::document::StoreDocument;
use crate::store::{Record, Store, StoreResult, WriteOp};

#[derive(Debug, Default)]
pub struct MemoryStore {
    document: StoreDocument,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the whole store in the persisted JSON layout.
    pub fn export_json(&self) -> StoreResult<Vec<u8>> {
        self.document.to_json()
    }
}

impl Store for MemoryStore {
    fn apply(&mut self, ops: Vec<WriteOp>) -> StoreResult<()> {
        self.document.apply(ops);
        Ok(())
    }

    fn load_record(&self, kind: EntityKind, id: EntityId) -> StoreResult<Option<Record>> {
        Ok(self.document.get(kind, id).cloned())
    }

    fn load_all_records(&self, kind: EntityKind) -> StoreResult<Vec<Record>> {
        Ok(self.document.records(kind))
    }

    fn count(&self, kind: EntityKind) -> StoreResult<usize> {
        Ok(self.document.len(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::model::amenity::Amenity;
    use crate::model::{Entity, EntityKind};
    use crate::store::Store;

    #[test]
    fn export_uses_persisted_layout() {
        let mut store = MemoryStore::new();
        let amenity = Amenity::new("Parking", "").unwrap();
        store.save(&amenity).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&store.export_json().unwrap()).unwrap();
        assert_eq!(
            value[EntityKind::Amenity.as_str()][amenity.id().to_string()]["name"],
            "Parking"
        );
    }
}
