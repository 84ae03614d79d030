//! In-process store backed by `DashMap`.
//!
//! Used by the test suite and by `MNE_STORE=memory` for local runs. The
//! per-key entry guard makes compare-and-set atomic per item.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{EntityStore, StatusChange, StoreError};
use crate::models::{ReviewableItem, Status, StatusEvent, Variant};

struct Record {
    item: ReviewableItem,
    history: Vec<StatusEvent>,
}

#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<(Variant, String), Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an item as-is, bypassing the creation event. Test fixtures only.
    pub fn seed(&self, item: ReviewableItem) {
        self.records.insert(
            (item.variant, item.id.clone()),
            Record {
                item,
                history: Vec::new(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get(&self, variant: Variant, id: &str) -> Result<Option<ReviewableItem>, StoreError> {
        Ok(self
            .records
            .get(&(variant, id.to_string()))
            .map(|r| r.item.clone()))
    }

    async fn insert(&self, item: &ReviewableItem, actor_id: &str) -> Result<(), StoreError> {
        match self.records.entry((item.variant, item.id.clone())) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(item.id.clone())),
            Entry::Vacant(slot) => {
                let created = StatusEvent {
                    item_id: item.id.clone(),
                    variant: item.variant,
                    from: None,
                    to: item.status,
                    actor_id: actor_id.to_string(),
                    notes: None,
                    at: item.created_at,
                };
                slot.insert(Record {
                    item: item.clone(),
                    history: vec![created],
                });
                Ok(())
            }
        }
    }

    async fn compare_and_set_status(
        &self,
        variant: Variant,
        id: &str,
        expected: Status,
        change: StatusChange,
    ) -> Result<ReviewableItem, StoreError> {
        let mut record = self
            .records
            .get_mut(&(variant, id.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                variant,
                id: id.to_string(),
            })?;

        if record.item.status != expected {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected,
                actual: record.item.status,
            });
        }

        let event = change.event(variant, id, expected);
        change.apply_to(&mut record.item);
        record.history.push(event);
        Ok(record.item.clone())
    }

    async fn list_by_status(
        &self,
        variant: Variant,
        status: Status,
    ) -> Result<Vec<ReviewableItem>, StoreError> {
        let mut items: Vec<ReviewableItem> = self
            .records
            .iter()
            .filter(|r| r.key().0 == variant && r.item.status == status)
            .map(|r| r.item.clone())
            .collect();
        items.sort_by(|a, b| (a.submitted_at, &a.id).cmp(&(b.submitted_at, &b.id)));
        Ok(items)
    }

    async fn history(&self, variant: Variant, id: &str) -> Result<Vec<StatusEvent>, StoreError> {
        self.records
            .get(&(variant, id.to_string()))
            .map(|r| r.history.clone())
            .ok_or_else(|| StoreError::NotFound {
                variant,
                id: id.to_string(),
            })
    }
}
