//! Pending Queue: FIFO view of items awaiting review.

use crate::errors::AppError;
use crate::models::{ReviewableItem, Status, Variant};
use crate::store::EntityStore;

/// Items of `variant` in `Pending Approval`, oldest submission first.
pub async fn pending_queue(
    store: &dyn EntityStore,
    variant: Variant,
) -> Result<Vec<ReviewableItem>, AppError> {
    let mut items = store.list_by_status(variant, Status::PendingApproval).await?;
    // Stable: keeps the store's tie-break order for equal timestamps.
    items.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
    Ok(items)
}
