//! Decision Applier: stamps audit metadata and writes through the store.

use chrono::Utc;

use super::transition::Transition;
use crate::errors::AppError;
use crate::models::{Actor, Decision, ReviewableItem};
use crate::store::{EntityStore, StatusChange};

/// Persist a validated transition together with its decision record.
///
/// The write is conditional on the item still being in `transition.from`;
/// a concurrent change surfaces as [`AppError::Conflict`] and is not retried.
pub async fn apply_decision(
    store: &dyn EntityStore,
    item: &ReviewableItem,
    transition: &Transition,
    actor: &Actor,
    notes: &str,
) -> Result<ReviewableItem, AppError> {
    let now = Utc::now();
    let decision = Decision {
        decided_by: actor.id.clone(),
        decided_at: now,
        notes: notes.trim().to_string(),
        outcome: transition.outcome(),
    };

    let change = StatusChange {
        status: transition.to,
        notes: (!decision.notes.is_empty()).then(|| decision.notes.clone()),
        decision: Some(decision),
        submitted_at: None,
        actor_id: actor.id.clone(),
        at: now,
    };

    let updated = store
        .compare_and_set_status(item.variant, &item.id, transition.from, change)
        .await?;
    Ok(updated)
}
