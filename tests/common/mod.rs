//! Shared fixtures for the integration tests.

use async_trait::async_trait;
use tokio::sync::Barrier;

use mne::models::{ReviewableItem, Status, StatusEvent, Variant};
use mne::store::memory::MemoryStore;
use mne::store::{EntityStore, StatusChange, StoreError};

/// Wraps a [`MemoryStore`] and holds every `get` at a barrier until
/// `parties` readers have arrived.
///
/// Two decisions on the same item therefore both read it while it is still
/// pending, and only then race on the compare-and-set.
pub struct LockstepStore {
    inner: MemoryStore,
    barrier: Barrier,
}

impl LockstepStore {
    pub fn new(inner: MemoryStore, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
        }
    }

    /// The wrapped store, for reads that must not wait at the barrier.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl EntityStore for LockstepStore {
    async fn get(&self, variant: Variant, id: &str) -> Result<Option<ReviewableItem>, StoreError> {
        let item = self.inner.get(variant, id).await?;
        self.barrier.wait().await;
        Ok(item)
    }

    async fn insert(&self, item: &ReviewableItem, actor_id: &str) -> Result<(), StoreError> {
        self.inner.insert(item, actor_id).await
    }

    async fn compare_and_set_status(
        &self,
        variant: Variant,
        id: &str,
        expected: Status,
        change: StatusChange,
    ) -> Result<ReviewableItem, StoreError> {
        self.inner
            .compare_and_set_status(variant, id, expected, change)
            .await
    }

    async fn list_by_status(
        &self,
        variant: Variant,
        status: Status,
    ) -> Result<Vec<ReviewableItem>, StoreError> {
        self.inner.list_by_status(variant, status).await
    }

    async fn history(&self, variant: Variant, id: &str) -> Result<Vec<StatusEvent>, StoreError> {
        self.inner.history(variant, id).await
    }
}
