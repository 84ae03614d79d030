//! Entity Store: persistence seam for reviewable items.
//!
//! Every status write is a compare-and-set on the item's current status, so
//! two reviewers racing on the same item can never both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::errors::AppError;
use crate::models::{Decision, ReviewableItem, Status, StatusEvent, Variant};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{variant} '{id}' not found")]
    NotFound { variant: Variant, id: String },

    #[error("item '{id}' is '{actual}', expected '{expected}'")]
    Conflict {
        id: String,
        expected: Status,
        actual: Status,
    },

    #[error("item '{0}' already exists")]
    AlreadyExists(String),

    #[error("corrupt row for item '{id}': {reason}")]
    Corrupt { id: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { variant, id } => AppError::NotFound { variant, id },
            StoreError::Conflict { id, expected, actual } => AppError::Conflict(format!(
                "item '{}' changed from '{}' to '{}' concurrently; refresh and retry",
                id, expected, actual
            )),
            StoreError::AlreadyExists(id) => {
                AppError::Conflict(format!("item '{}' already exists", id))
            }
            StoreError::Corrupt { id, reason } => {
                AppError::Internal(anyhow::anyhow!("corrupt row for item '{}': {}", id, reason))
            }
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

/// A conditional status write.
///
/// `decision` replaces the stored decision when present and leaves it alone
/// otherwise. `submitted_at` is only recorded if the item has never been
/// submitted before.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: Status,
    pub decision: Option<Decision>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub actor_id: String,
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    /// The audit event this change produces for `item_id`.
    pub fn event(&self, variant: Variant, item_id: &str, from: Status) -> StatusEvent {
        StatusEvent {
            item_id: item_id.to_string(),
            variant,
            from: Some(from),
            to: self.status,
            actor_id: self.actor_id.clone(),
            notes: self.notes.clone(),
            at: self.at,
        }
    }

    /// Apply the change to an in-memory copy of the item.
    pub fn apply_to(&self, item: &mut ReviewableItem) {
        item.status = self.status;
        if item.submitted_at.is_none() {
            item.submitted_at = self.submitted_at;
        }
        if let Some(decision) = &self.decision {
            item.decision = Some(decision.clone());
        }
        item.updated_at = self.at;
    }
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get(&self, variant: Variant, id: &str) -> Result<Option<ReviewableItem>, StoreError>;

    /// Persist a new item together with its creation event.
    async fn insert(&self, item: &ReviewableItem, actor_id: &str) -> Result<(), StoreError>;

    /// Write `change` only if the item's status is still `expected`.
    ///
    /// Fails with [`StoreError::NotFound`] if the item is gone and
    /// [`StoreError::Conflict`] if its status moved on.
    async fn compare_and_set_status(
        &self,
        variant: Variant,
        id: &str,
        expected: Status,
        change: StatusChange,
    ) -> Result<ReviewableItem, StoreError>;

    /// Items in `status`, ordered by `submitted_at` ascending, then id.
    async fn list_by_status(
        &self,
        variant: Variant,
        status: Status,
    ) -> Result<Vec<ReviewableItem>, StoreError>;

    /// Audit trail for one item, oldest first.
    async fn history(&self, variant: Variant, id: &str) -> Result<Vec<StatusEvent>, StoreError>;

    /// Connectivity check used by `/readyz`.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
