use std::sync::Arc;

use axum::{
    extract::{FromRequest, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Actor, ReviewableItem, Status, StatusEvent, Variant};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

/// Success envelope shared by every endpoint; failures use the
/// `{ success: false, message }` body produced by [`AppError`].
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

#[derive(Debug, Serialize)]
pub struct ItemList {
    pub items: Vec<ReviewableItem>,
}

#[derive(Debug, Serialize)]
pub struct EventList {
    pub events: Vec<StatusEvent>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub status: String, // "Active" | "Rejected"
    #[serde(default)]
    pub notes: String,
    pub decided_by: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateItemRequest {
    #[serde(default = "empty_payload")]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub submit: bool,
}

fn empty_payload() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String, // "Inactive" | "Suspended" | "Active"
    pub reason: Option<String>,
}

// ── Helpers ──────────────────────────────────────────────────

/// `Json` whose rejection is an [`AppError`], so a bad body gets the
/// standard failure envelope instead of axum's plain-text message.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Parse the `:variant` path segment and check it is served over HTTP.
fn resolve_variant(state: &AppState, raw: &str) -> Result<Variant, AppError> {
    let variant: Variant = raw.parse().map_err(AppError::UnsupportedVariant)?;
    if !state.config.variant_enabled(variant) {
        tracing::debug!("request for disabled variant: {}", variant);
        return Err(AppError::UnsupportedVariant(format!(
            "{} approval is not enabled on this server",
            variant
        )));
    }
    Ok(variant)
}

fn parse_status(raw: &str) -> Result<Status, AppError> {
    raw.parse().map_err(AppError::Validation)
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/items/:variant?status=Pending Approval: review queue (oldest first)
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(variant): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<ItemList>>, AppError> {
    let variant = resolve_variant(&state, &variant)?;
    let status = match params.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => Status::PendingApproval,
    };
    tracing::debug!(actor = %actor.id, variant = %variant, status = %status, "list_items");

    let items = state.workflow.list(variant, status).await?;
    Ok(ok(ItemList { items }))
}

/// GET /api/v1/items/:variant/:id: single item
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path((variant, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ReviewableItem>>, AppError> {
    let variant = resolve_variant(&state, &variant)?;
    let item = state.workflow.get(variant, &id).await?;
    Ok(ok(item))
}

/// PUT /api/v1/items/:variant/:id: approve or reject a pending item
pub async fn decide_item(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((variant, id)): Path<(String, String)>,
    body: Result<ApiJson<DecisionRequest>, AppError>,
) -> Result<Json<ApiResponse<ReviewableItem>>, AppError> {
    let variant = resolve_variant(&state, &variant)?;
    // Non-approvers are refused before the body is looked at.
    state.workflow.authorize_decision(&actor, variant, &id)?;

    let ApiJson(payload) = body?;
    let requested = parse_status(&payload.status)?;

    // The token is the source of identity; the body may only echo it.
    if let Some(claimed) = payload.decided_by.as_deref() {
        if claimed != actor.id {
            tracing::warn!(
                actor = %actor.id,
                claimed = claimed,
                "decide_item: decided_by does not match authenticated user"
            );
            return Err(AppError::Validation(
                "decided_by must match the authenticated user".into(),
            ));
        }
    }

    let item = state
        .workflow
        .decide(&actor, variant, &id, requested, &payload.notes)
        .await?;
    Ok(ok(item))
}

/// POST /api/v1/items/:variant: record a new item (draft or submitted)
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(variant): Path<String>,
    ApiJson(payload): ApiJson<CreateItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReviewableItem>>), AppError> {
    let variant = resolve_variant(&state, &variant)?;
    let item = state
        .workflow
        .create(&actor, variant, payload.payload, payload.submit)
        .await?;
    Ok((StatusCode::CREATED, ok(item)))
}

/// POST /api/v1/items/:variant/:id/submit: send a draft for review
pub async fn submit_item(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((variant, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ReviewableItem>>, AppError> {
    let variant = resolve_variant(&state, &variant)?;
    let item = state.workflow.submit(&actor, variant, &id).await?;
    Ok(ok(item))
}

/// POST /api/v1/items/:variant/:id/status: deactivate, suspend or reactivate
pub async fn set_item_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((variant, id)): Path<(String, String)>,
    ApiJson(payload): ApiJson<StatusRequest>,
) -> Result<Json<ApiResponse<ReviewableItem>>, AppError> {
    let variant = resolve_variant(&state, &variant)?;
    let target = parse_status(&payload.status)?;
    let item = state
        .workflow
        .set_administrative_status(&actor, variant, &id, target, payload.reason)
        .await?;
    Ok(ok(item))
}

/// GET /api/v1/items/:variant/:id/history: status audit trail
pub async fn item_history(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path((variant, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<EventList>>, AppError> {
    let variant = resolve_variant(&state, &variant)?;
    let events = state.workflow.history(variant, &id).await?;
    Ok(ok(EventList { events }))
}
