//! Identity-keyed object cache: (entity type, uuid) → materialized record.

use crate::record::Record;
use std::collections::HashMap;
use std::sync::RwLock;

/// Cache backend contract: get/set/delete by composite key, no expiry.
///
/// Implementations are last-writer-wins; the invalidation discipline
/// (evict on every save and delete) lives in the mutation pipeline, and
/// population happens only through an explicit `cache()` call.
pub trait ObjectCache: Send + Sync {
    fn get(&self, uuid: &str, entity: &str) -> Option<Record>;
    fn set(&self, uuid: &str, record: Record, entity: &str);
    fn delete(&self, uuid: &str, entity: &str);
}

impl<C: ObjectCache + ?Sized> ObjectCache for std::sync::Arc<C> {
    fn get(&self, uuid: &str, entity: &str) -> Option<Record> {
        (**self).get(uuid, entity)
    }

    fn set(&self, uuid: &str, record: Record, entity: &str) {
        (**self).set(uuid, record, entity);
    }

    fn delete(&self, uuid: &str, entity: &str) {
        (**self).delete(uuid, entity);
    }
}

/// In-process cache. Entries leave only via explicit delete.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<(String, String), Record>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectCache for MemoryCache {
    fn get(&self, uuid: &str, entity: &str) -> Option<Record> {
        let entries = self.entries.read().ok()?;
        entries.get(&(entity.to_string(), uuid.to_string())).cloned()
    }

    fn set(&self, uuid: &str, record: Record, entity: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert((entity.to_string(), uuid.to_string()), record);
        }
    }

    fn delete(&self, uuid: &str, entity: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&(entity.to_string(), uuid.to_string()));
        }
    }
}
