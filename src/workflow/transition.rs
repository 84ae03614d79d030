//! State Transition Validator.
//!
//! Approval cycle:
//!
//! ```text
//! Draft ──submit──▶ Pending Approval ──approve──▶ Active ◀──reactivate── Inactive / Suspended
//!                          │                        │
//!                          └──reject──▶ Rejected    └──deactivate / suspend──▶ Inactive / Suspended
//! ```
//!
//! Everything here is a pure function of its inputs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Outcome, Status};

pub const NOT_AWAITING_APPROVAL: &str = "item is not awaiting approval";
pub const REJECTION_REQUIRES_NOTES: &str = "rejection requires notes";

/// An approved status change, ready to be applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: Status,
    pub to: Status,
    pub timestamp: DateTime<Utc>,
}

impl Transition {
    /// Outcome recorded in the decision for an approval-cycle transition.
    pub fn outcome(&self) -> Outcome {
        if self.to == Status::Active {
            Outcome::Approved
        } else {
            Outcome::Rejected
        }
    }
}

/// Decide whether a review decision may move an item from `current` to `requested`.
pub fn validate_transition(
    current: Status,
    requested: Status,
    notes: &str,
) -> Result<Transition, AppError> {
    validate_transition_at(current, requested, notes, Utc::now())
}

pub fn validate_transition_at(
    current: Status,
    requested: Status,
    notes: &str,
    timestamp: DateTime<Utc>,
) -> Result<Transition, AppError> {
    if !matches!(requested, Status::Active | Status::Rejected) {
        return Err(AppError::Validation(format!(
            "a review decision must set status to 'Active' or 'Rejected', not '{}'",
            requested
        )));
    }
    if current != Status::PendingApproval {
        return Err(AppError::InvalidState(NOT_AWAITING_APPROVAL.to_string()));
    }
    if requested == Status::Rejected && notes.trim().is_empty() {
        return Err(AppError::Validation(REJECTION_REQUIRES_NOTES.to_string()));
    }
    Ok(Transition {
        from: current,
        to: requested,
        timestamp,
    })
}

/// `Draft → Pending Approval`.
pub fn validate_submission(current: Status, timestamp: DateTime<Utc>) -> Result<Transition, AppError> {
    if current != Status::Draft {
        return Err(AppError::InvalidState(format!(
            "only draft items can be submitted for approval (item is '{}')",
            current
        )));
    }
    Ok(Transition {
        from: current,
        to: Status::PendingApproval,
        timestamp,
    })
}

/// Administrative edges outside the approval cycle.
pub fn validate_administrative(
    current: Status,
    target: Status,
    timestamp: DateTime<Utc>,
) -> Result<Transition, AppError> {
    let allowed = matches!(
        (current, target),
        (Status::Active, Status::Inactive)
            | (Status::Active, Status::Suspended)
            | (Status::Inactive, Status::Active)
            | (Status::Suspended, Status::Active)
    );
    if !allowed {
        return Err(AppError::InvalidState(format!(
            "cannot change status from '{}' to '{}' administratively",
            current, target
        )));
    }
    Ok(Transition {
        from: current,
        to: target,
        timestamp,
    })
}
