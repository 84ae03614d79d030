//! Approval Workflow Engine.
//!
//! Order of checks for a review decision:
//! 1. the authorization gate (role must be an approver)
//! 2. the item must exist
//! 3. the state transition validator
//! 4. the decision applier (conditional write, no retries)
//!
//! The acting user is always passed in explicitly.

use std::sync::Arc;

use chrono::Utc;

use crate::errors::AppError;
use crate::middleware::metrics::WorkflowMetrics;
use crate::middleware::rbac::{self, Permission};
use crate::models::{Actor, ReviewableItem, Status, StatusEvent, Variant};
use crate::store::{EntityStore, StatusChange};

pub mod decision;
pub mod gate;
pub mod queue;
pub mod transition;

use gate::AuthorizationGate;

pub struct ApprovalWorkflow {
    store: Arc<dyn EntityStore>,
    gate: AuthorizationGate,
    metrics: Arc<WorkflowMetrics>,
}

impl ApprovalWorkflow {
    pub fn new(
        store: Arc<dyn EntityStore>,
        gate: AuthorizationGate,
        metrics: Arc<WorkflowMetrics>,
    ) -> Self {
        Self {
            store,
            gate,
            metrics,
        }
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    pub fn metrics(&self) -> &WorkflowMetrics {
        &self.metrics
    }

    /// Run only the authorization gate for a decision on `variant`/`id`.
    ///
    /// Callers holding an unparsed request run this before looking at the
    /// body, so a non-approver is refused no matter what they sent.
    pub fn authorize_decision(&self, actor: &Actor, variant: Variant, id: &str) -> Result<(), AppError> {
        let result = self.gate.authorize(&actor.role);
        if let Err(e) = &result {
            self.observe_failure("decide", actor, variant, id, e);
        }
        result
    }

    /// Approve (`Active`) or reject (`Rejected`) a pending item.
    pub async fn decide(
        &self,
        actor: &Actor,
        variant: Variant,
        id: &str,
        requested: Status,
        notes: &str,
    ) -> Result<ReviewableItem, AppError> {
        let result = self.decide_inner(actor, variant, id, requested, notes).await;
        match &result {
            Ok(item) => {
                if let Some(d) = &item.decision {
                    self.metrics.record_decision(variant, d.outcome);
                }
                self.metrics.record_transition(variant, item.status);
                tracing::info!(
                    variant = %variant,
                    item_id = %id,
                    actor = %actor.id,
                    role = %actor.role,
                    status = %item.status,
                    "review decision applied"
                );
            }
            Err(e) => self.observe_failure("decide", actor, variant, id, e),
        }
        result
    }

    async fn decide_inner(
        &self,
        actor: &Actor,
        variant: Variant,
        id: &str,
        requested: Status,
        notes: &str,
    ) -> Result<ReviewableItem, AppError> {
        self.gate.authorize(&actor.role)?;
        let item = self.require(variant, id).await?;
        let transition = transition::validate_transition(item.status, requested, notes)?;
        decision::apply_decision(self.store.as_ref(), &item, &transition, actor, notes).await
    }

    pub async fn pending_queue(&self, variant: Variant) -> Result<Vec<ReviewableItem>, AppError> {
        queue::pending_queue(self.store.as_ref(), variant).await
    }

    /// Items of `variant` in `status`; the pending status gets the FIFO queue contract.
    pub async fn list(
        &self,
        variant: Variant,
        status: Status,
    ) -> Result<Vec<ReviewableItem>, AppError> {
        if status == Status::PendingApproval {
            return self.pending_queue(variant).await;
        }
        Ok(self.store.list_by_status(variant, status).await?)
    }

    pub async fn get(&self, variant: Variant, id: &str) -> Result<ReviewableItem, AppError> {
        self.require(variant, id).await
    }

    pub async fn history(&self, variant: Variant, id: &str) -> Result<Vec<StatusEvent>, AppError> {
        Ok(self.store.history(variant, id).await?)
    }

    /// Record a new item as a draft, or straight into the review queue.
    pub async fn create(
        &self,
        actor: &Actor,
        variant: Variant,
        payload: serde_json::Value,
        submit: bool,
    ) -> Result<ReviewableItem, AppError> {
        let result = self.create_inner(actor, variant, payload, submit).await;
        match &result {
            Ok(item) => self.observe("create", actor, variant, &item.id, &result),
            Err(e) => self.observe_failure("create", actor, variant, "-", e),
        }
        result
    }

    async fn create_inner(
        &self,
        actor: &Actor,
        variant: Variant,
        payload: serde_json::Value,
        submit: bool,
    ) -> Result<ReviewableItem, AppError> {
        rbac::enforce(actor, &Permission::Submit)?;
        if !payload.is_object() {
            return Err(AppError::Validation("payload must be a JSON object".into()));
        }
        let item = ReviewableItem::new(variant, payload, &actor.id, submit, Utc::now());
        self.store.insert(&item, &actor.id).await?;
        Ok(item)
    }

    /// `Draft → Pending Approval`, stamping `submitted_at`.
    pub async fn submit(
        &self,
        actor: &Actor,
        variant: Variant,
        id: &str,
    ) -> Result<ReviewableItem, AppError> {
        let result = self.submit_inner(actor, variant, id).await;
        self.observe("submit", actor, variant, id, &result);
        result
    }

    async fn submit_inner(
        &self,
        actor: &Actor,
        variant: Variant,
        id: &str,
    ) -> Result<ReviewableItem, AppError> {
        rbac::enforce(actor, &Permission::Submit)?;
        let item = self.require(variant, id).await?;
        let t = transition::validate_submission(item.status, Utc::now())?;
        let change = StatusChange {
            status: t.to,
            decision: None,
            submitted_at: Some(t.timestamp),
            actor_id: actor.id.clone(),
            notes: None,
            at: t.timestamp,
        };
        Ok(self
            .store
            .compare_and_set_status(variant, id, t.from, change)
            .await?)
    }

    /// Deactivate, suspend or reactivate an approved item. Admin only.
    ///
    /// The approval decision on record is left untouched.
    pub async fn set_administrative_status(
        &self,
        actor: &Actor,
        variant: Variant,
        id: &str,
        target: Status,
        reason: Option<String>,
    ) -> Result<ReviewableItem, AppError> {
        let result = self
            .set_administrative_status_inner(actor, variant, id, target, reason)
            .await;
        self.observe("set_status", actor, variant, id, &result);
        result
    }

    async fn set_administrative_status_inner(
        &self,
        actor: &Actor,
        variant: Variant,
        id: &str,
        target: Status,
        reason: Option<String>,
    ) -> Result<ReviewableItem, AppError> {
        rbac::enforce(actor, &Permission::Administer)?;
        let item = self.require(variant, id).await?;
        let t = transition::validate_administrative(item.status, target, Utc::now())?;
        let change = StatusChange {
            status: t.to,
            decision: None,
            submitted_at: None,
            actor_id: actor.id.clone(),
            notes: reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            at: t.timestamp,
        };
        Ok(self
            .store
            .compare_and_set_status(variant, id, t.from, change)
            .await?)
    }

    async fn require(&self, variant: Variant, id: &str) -> Result<ReviewableItem, AppError> {
        self.store
            .get(variant, id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                variant,
                id: id.to_string(),
            })
    }

    fn observe(
        &self,
        operation: &str,
        actor: &Actor,
        variant: Variant,
        id: &str,
        result: &Result<ReviewableItem, AppError>,
    ) {
        match result {
            Ok(item) => {
                self.metrics.record_transition(variant, item.status);
                tracing::info!(
                    operation,
                    variant = %variant,
                    item_id = %id,
                    actor = %actor.id,
                    status = %item.status,
                    "status changed"
                );
            }
            Err(e) => self.observe_failure(operation, actor, variant, id, e),
        }
    }

    fn observe_failure(&self, operation: &str, actor: &Actor, variant: Variant, id: &str, e: &AppError) {
        self.metrics.record_failure(operation, e);
        match e {
            AppError::Database(_) | AppError::Internal(_) => tracing::error!(
                operation,
                variant = %variant,
                item_id = %id,
                actor = %actor.id,
                "workflow operation failed: {}",
                e
            ),
            _ => tracing::warn!(
                operation,
                variant = %variant,
                item_id = %id,
                actor = %actor.id,
                kind = e.kind(),
                "workflow operation refused: {}",
                e
            ),
        }
    }
}
