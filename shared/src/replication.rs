//! Replication push bookkeeping.
//!
//! The tracker remembers the version of every field it last pushed. A field
//! whose version has moved since then is part of the next push; everything
//! else is left out. A field that has never been pushed is always included,
//! so the first push after construction (or after [`ReplicationTracker::invalidate`])
//! carries the full state.

use std::collections::HashMap;

use crate::protocol::VariableUpdate;
use crate::store::{EntityId, EntityStore};

#[derive(Debug, Default)]
pub struct ReplicationTracker {
    pushed: HashMap<(EntityId, &'static str), u64>,
}

impl ReplicationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every field changed since the previous call and records it as pushed.
    pub fn collect(&mut self, store: &EntityStore) -> Vec<VariableUpdate> {
        let mut updates = Vec::new();

        for (id, entity) in store.iter() {
            for field in entity.fields() {
                let key = (id, field.name);
                if self.pushed.get(&key) == Some(&field.version) {
                    continue;
                }
                self.pushed.insert(key, field.version);
                updates.push(VariableUpdate {
                    entity_id: id.0,
                    field: field.name.to_string(),
                    value: field.value,
                });
            }
        }

        updates
    }

    /// Forgets what was pushed so the next push carries every field.
    pub fn invalidate(&mut self) {
        self.pushed.clear();
    }
}
