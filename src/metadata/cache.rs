//! Metadata Cache
//!
//! Write-once-per-type store of resolved metadata. Resolution happens outside
//! the lock; the first published result wins and later ones are discarded,
//! so every caller observes the same `Arc`.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::model::EntityMetadata;

#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<TypeId, Arc<EntityMetadata>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, type_id: TypeId) -> Option<Arc<EntityMetadata>> {
        self.entries.read().get(&type_id).cloned()
    }

    /// Publish a resolved entity, returning the instance now in the cache.
    pub fn publish(&self, metadata: EntityMetadata) -> Arc<EntityMetadata> {
        let type_id = metadata.type_id;
        let mut entries = self.entries.write();
        entries
            .entry(type_id)
            .or_insert_with(|| {
                tracing::debug!(entity = %metadata.type_name, "Cached entity metadata");
                Arc::new(metadata)
            })
            .clone()
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.entries.read().contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
