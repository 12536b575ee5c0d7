//! Correlation store: keyed collection of in-flight message groups.
//!
//! The store hands out [`GroupSlot`]s — a group behind its own async mutex.
//! "Check policy, then mutate" is atomic per correlation id because both
//! run under that lock, while unrelated ids proceed fully in parallel.
//! Durable implementations are external collaborators that must honor the
//! same contract.

mod memory;

use switchyard_core::{CorrelationId, MessageGroup};
use tokio::sync::{Mutex, MutexGuard, TryLockError};

pub use memory::InMemoryGroupStore;

/// A group plus its per-group lock.
pub struct GroupSlot {
    group: Mutex<MessageGroup>,
}

impl GroupSlot {
    #[must_use]
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            group: Mutex::new(MessageGroup::new(correlation_id)),
        }
    }

    /// Acquire this group's lock.
    pub async fn lock(&self) -> MutexGuard<'_, MessageGroup> {
        self.group.lock().await
    }

    /// Acquire the lock without waiting. Expiry sweeps use this so a group
    /// that is actively being handled is simply skipped until the next
    /// tick.
    ///
    /// # Errors
    ///
    /// Returns [`TryLockError`] when another task holds the lock.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, MessageGroup>, TryLockError> {
        self.group.try_lock()
    }
}

/// Thread-safe map of correlation id to group slot.
pub trait GroupStore: Send + Sync {
    /// Fetch the slot for `correlation_id`, creating an empty group
    /// atomically on first access: two concurrent callers with the same key
    /// observe the same slot.
    fn get_or_create(&self, correlation_id: &CorrelationId) -> std::sync::Arc<GroupSlot>;

    /// Fetch an existing slot, if any.
    fn get(&self, correlation_id: &CorrelationId) -> Option<std::sync::Arc<GroupSlot>>;

    /// Drop the slot. Returns whether one was present.
    fn remove(&self, correlation_id: &CorrelationId) -> bool;

    /// Visit every live slot (expiry sweeps). Callbacks must not block.
    fn for_each(&self, visit: &mut dyn FnMut(&CorrelationId, &std::sync::Arc<GroupSlot>));

    /// Number of groups currently in flight.
    fn group_count(&self) -> usize;
}
