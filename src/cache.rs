use crate::model::{EntityId, EntityResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-point results in the order they became ready.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    order: Vec<EntityId>,
    entries: HashMap<EntityId, Arc<EntityResult>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace wholesale; a replaced entry keeps its position.
    pub fn insert(&mut self, result: EntityResult) {
        let id = result.id;
        if self.entries.insert(id, Arc::new(result)).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Arc<EntityResult>> {
        self.entries.get(&id)
    }

    /// Apply `edit` to a copy of one entry; other entries keep their `Arc`.
    pub fn modify<F>(&mut self, id: EntityId, edit: F) -> bool
    where
        F: FnOnce(&mut EntityResult),
    {
        match self.entries.get_mut(&id) {
            Some(slot) => {
                let mut updated = EntityResult::clone(slot);
                edit(&mut updated);
                *slot = Arc::new(updated);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityResult>> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    /// True when there is at least one result and none has readings.
    pub fn all_empty(&self) -> bool {
        !self.is_empty() && self.iter().all(|r| r.is_empty())
    }
}
