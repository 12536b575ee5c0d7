//! In-memory group store over a concurrent map.

use std::sync::Arc;

use dashmap::DashMap;
use switchyard_core::CorrelationId;

use super::{GroupSlot, GroupStore};

/// Default store: `DashMap` keyed by correlation id. Insert-if-absent is
/// atomic via the map's entry API; the per-group mutex lives in the slot.
#[derive(Default)]
pub struct InMemoryGroupStore {
    groups: DashMap<CorrelationId, Arc<GroupSlot>>,
}

impl InMemoryGroupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GroupStore for InMemoryGroupStore {
    fn get_or_create(&self, correlation_id: &CorrelationId) -> Arc<GroupSlot> {
        Arc::clone(
            &self
                .groups
                .entry(correlation_id.clone())
                .or_insert_with(|| Arc::new(GroupSlot::new(correlation_id.clone()))),
        )
    }

    fn get(&self, correlation_id: &CorrelationId) -> Option<Arc<GroupSlot>> {
        self.groups
            .get(correlation_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn remove(&self, correlation_id: &CorrelationId) -> bool {
        self.groups.remove(correlation_id).is_some()
    }

    fn for_each(&self, visit: &mut dyn FnMut(&CorrelationId, &Arc<GroupSlot>)) {
        for entry in &self.groups {
            visit(entry.key(), entry.value());
        }
    }

    fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use switchyard_core::Message;

    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = InMemoryGroupStore::new();
        let id = CorrelationId::from("batch-1");

        let first = store.get_or_create(&id);
        let second = store.get_or_create(&id);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.group_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_observe_the_same_slot() {
        let store = Arc::new(InMemoryGroupStore::new());
        let id = CorrelationId::from("shared");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let slot = store.get_or_create(&id);
                let mut group = slot.lock().await;
                group.add(Message::with_payload(()));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let slot = store.get(&id).unwrap();
        assert_eq!(slot.lock().await.size(), 16);
        assert_eq!(store.group_count(), 1);
    }

    #[tokio::test]
    async fn remove_drops_the_group() {
        let store = InMemoryGroupStore::new();
        let id = CorrelationId::from("gone");
        let _ = store.get_or_create(&id);

        assert!(store.remove(&id));
        assert!(store.get(&id).is_none());
        assert!(!store.remove(&id));
    }

    #[tokio::test]
    async fn for_each_visits_every_group() {
        let store = InMemoryGroupStore::new();
        for n in 0..5i64 {
            let _ = store.get_or_create(&CorrelationId::from(n));
        }

        let mut seen = 0;
        store.for_each(&mut |_, _| seen += 1);
        assert_eq!(seen, 5);
    }
}
