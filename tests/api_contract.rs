//! HTTP contract tests: the router is driven in-process with `oneshot`,
//! backed by the in-memory store and real HS256 tokens.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

use common::LockstepStore;

use mne::config::{Config, StoreBackend};
use mne::middleware::auth::JwtAuthProvider;
use mne::middleware::rbac::Role;
use mne::models::{Actor, ReviewableItem, Status, Variant};
use mne::store::memory::MemoryStore;
use mne::store::EntityStore;
use mne::workflow::gate::AuthorizationGate;
use mne::AppState;

const SECRET: &str = "contract-test-secret";

fn test_config() -> Config {
    Config {
        port: 0,
        database_url: String::new(),
        store: StoreBackend::Memory,
        jwt_secret: SECRET.to_string(),
        approver_roles: AuthorizationGate::default_approvers(),
        enabled_variants: vec![Variant::Beneficiary, Variant::Program],
        dashboard_origin: "http://localhost:3000".to_string(),
    }
}

fn pending(variant: Variant, id: &str, minutes: i64) -> ReviewableItem {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let mut item = ReviewableItem::new(variant, json!({ "name": id }), "u-enumerator", true, t0);
    item.id = id.to_string();
    item.submitted_at = Some(t0 + Duration::minutes(minutes));
    item
}

fn build(items: Vec<ReviewableItem>) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    for i in items {
        store.seed(i);
    }
    let state = AppState::new(test_config(), store.clone()).unwrap();
    (mne::api::app(Arc::new(state)), store)
}

fn build_lockstep(items: Vec<ReviewableItem>) -> (Router, Arc<LockstepStore>) {
    let inner = MemoryStore::new();
    for i in items {
        inner.seed(i);
    }
    let store = Arc::new(LockstepStore::new(inner, 2));
    let state = AppState::new(test_config(), store.clone()).unwrap();
    (mne::api::app(Arc::new(state)), store)
}

fn token(user: &str, role: Role) -> String {
    JwtAuthProvider::new(SECRET)
        .issue(&Actor::new(user, role), Duration::hours(1))
        .unwrap()
}

fn request(method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn raw_json_request(method: Method, uri: &str, bearer: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn assert_failure_envelope(body: &Value) {
    assert_eq!(body["success"], false, "{body}");
    assert!(body["message"].is_string(), "{body}");
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

// ═══════════════════════════════════════════════════════════════════════════
// Authentication
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_missing_bearer_is_401() {
    let (app, _) = build(vec![]);
    let (status, body) = send(&app, request(Method::GET, "/api/v1/items/beneficiary", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_401() {
    let (app, _) = build(vec![]);
    let forged = JwtAuthProvider::new("someone-else")
        .issue(&Actor::new("u-1", Role::Admin), Duration::hours(1))
        .unwrap();
    let (status, _) = send(
        &app,
        request(Method::GET, "/api/v1/items/beneficiary", Some(&forged), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ═══════════════════════════════════════════════════════════════════════════
// Review queue
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_list_pending_envelope_and_order() {
    let (app, _) = build(vec![
        pending(Variant::Beneficiary, "B-2", 20),
        pending(Variant::Beneficiary, "B-1", 10),
    ]);
    let t = token("u-3", Role::Viewer);

    let (status, body) = send(
        &app,
        request(
            Method::GET,
            "/api/v1/items/beneficiary?status=Pending%20Approval",
            Some(&t),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], "B-1");
    assert_eq!(items[1]["id"], "B-2");
    assert_eq!(items[0]["status"], "Pending Approval");
    assert_eq!(items[0]["variant"], "beneficiary");

    // No status filter means the review queue.
    let (_, default_body) = send(
        &app,
        request(Method::GET, "/api/v1/items/beneficiary", Some(&t), None),
    )
    .await;
    assert_eq!(default_body, body);
}

#[tokio::test]
async fn test_unknown_status_filter_is_422() {
    let (app, _) = build(vec![]);
    let t = token("u-3", Role::Viewer);
    let (status, body) = send(
        &app,
        request(Method::GET, "/api/v1/items/program?status=archived", Some(&t), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_disabled_and_unknown_variants_are_404() {
    let (app, _) = build(vec![]);
    let t = token("u-1", Role::Admin);

    for uri in ["/api/v1/items/activity", "/api/v1/items/donor"] {
        let (status, body) = send(&app, request(Method::GET, uri, Some(&t), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["error"]["code"], "unsupported_variant");
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Decisions
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_put_approval_returns_updated_item() {
    let (app, store) = build(vec![pending(Variant::Beneficiary, "B-1", 0)]);
    let t = token("u-7", Role::ProgramManager);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/v1/items/beneficiary/B-1",
            Some(&t),
            Some(json!({ "status": "Active", "notes": "", "decided_by": "u-7" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "Active");
    assert_eq!(body["data"]["decision"]["decided_by"], "u-7");
    assert_eq!(body["data"]["decision"]["outcome"], "Approved");

    let stored = store.get(Variant::Beneficiary, "B-1").await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Active);
}

#[tokio::test]
async fn test_put_rejection_without_notes_is_422_with_message() {
    let (app, _) = build(vec![pending(Variant::Program, "P-2", 0)]);
    let t = token("u-7", Role::ProgramManager);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/v1/items/program/P-2",
            Some(&t),
            Some(json!({ "status": "Rejected", "notes": "  " })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "rejection requires notes");
}

#[tokio::test]
async fn test_put_by_data_entry_is_403() {
    let (app, store) = build(vec![pending(Variant::Beneficiary, "B-1", 0)]);
    let t = token("u-9", Role::DataEntry);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/v1/items/beneficiary/B-1",
            Some(&t),
            Some(json!({ "status": "Active" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let stored = store.get(Variant::Beneficiary, "B-1").await.unwrap().unwrap();
    assert_eq!(stored.status, Status::PendingApproval);
}

#[tokio::test]
async fn test_put_on_decided_item_is_409() {
    let (app, _) = build(vec![pending(Variant::Beneficiary, "B-1", 0)]);
    let t = token("u-7", Role::ProgramManager);
    let approve = || {
        request(
            Method::PUT,
            "/api/v1/items/beneficiary/B-1",
            Some(&t),
            Some(json!({ "status": "Active" })),
        )
    };

    let (first, _) = send(&app, approve()).await;
    assert_eq!(first, StatusCode::OK);
    let (second, body) = send(&app, approve()).await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "invalid_state");
}

#[tokio::test]
async fn test_put_missing_status_gets_json_failure_body() {
    let (app, store) = build(vec![pending(Variant::Beneficiary, "B-1", 0)]);
    let t = token("u-7", Role::ProgramManager);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/v1/items/beneficiary/B-1",
            Some(&t),
            Some(json!({ "notes": "x" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_failure_envelope(&body);
    assert_eq!(body["error"]["code"], "validation_failed");
    assert!(body["message"].as_str().unwrap().contains("status"), "{body}");

    let stored = store.get(Variant::Beneficiary, "B-1").await.unwrap().unwrap();
    assert_eq!(stored.status, Status::PendingApproval);
}

#[tokio::test]
async fn test_malformed_json_bodies_get_json_failure_body() {
    let (app, _) = build(vec![pending(Variant::Beneficiary, "B-1", 0)]);
    let t = token("u-1", Role::Admin);

    let cases = [
        (Method::PUT, "/api/v1/items/beneficiary/B-1"),
        (Method::POST, "/api/v1/items/beneficiary"),
        (Method::POST, "/api/v1/items/beneficiary/B-1/status"),
    ];
    for (method, uri) in cases {
        let (status, body) = send(&app, raw_json_request(method, uri, &t, "{\"status\": ")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        assert_failure_envelope(&body);
    }
}

#[tokio::test]
async fn test_non_approver_is_403_whatever_the_body() {
    let (app, store) = build(vec![pending(Variant::Beneficiary, "B-1", 0)]);
    let t = token("u-9", Role::DataEntry);
    let uri = "/api/v1/items/beneficiary/B-1";

    let bodies = [
        r#"{"status":"Active","decided_by":"someone-else"}"#,
        r#"{"status":"Approvedish"}"#,
        r#"{"status":"Rejected","notes":""}"#,
        r#"{"notes":"no status at all"}"#,
        "not json",
    ];
    for raw in bodies {
        let (status, body) = send(&app, raw_json_request(Method::PUT, uri, &t, raw)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "body {raw}");
        assert_failure_envelope(&body);
        assert_eq!(body["error"]["code"], "forbidden");
    }

    let stored = store.get(Variant::Beneficiary, "B-1").await.unwrap().unwrap();
    assert_eq!(stored.status, Status::PendingApproval);
}

#[tokio::test]
async fn test_racing_puts_one_ok_one_conflict() {
    let (app, store) = build_lockstep(vec![pending(Variant::Beneficiary, "B-1", 0)]);
    let admin = token("u-1", Role::Admin);
    let pm = token("u-7", Role::ProgramManager);

    let (a, b) = tokio::join!(
        send(
            &app,
            request(
                Method::PUT,
                "/api/v1/items/beneficiary/B-1",
                Some(&admin),
                Some(json!({ "status": "Active" })),
            ),
        ),
        send(
            &app,
            request(
                Method::PUT,
                "/api/v1/items/beneficiary/B-1",
                Some(&pm),
                Some(json!({ "status": "Rejected", "notes": "duplicate" })),
            ),
        ),
    );

    let mut statuses = [a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    let loser = if a.0 == StatusCode::CONFLICT { &a.1 } else { &b.1 };
    assert_failure_envelope(loser);
    assert_eq!(loser["error"]["code"], "conflict");

    let stored = store.inner().get(Variant::Beneficiary, "B-1").await.unwrap().unwrap();
    assert_ne!(stored.status, Status::PendingApproval);
}

#[tokio::test]
async fn test_decided_by_must_match_token_subject() {
    let (app, _) = build(vec![pending(Variant::Beneficiary, "B-1", 0)]);
    let t = token("u-7", Role::ProgramManager);

    let (status, _) = send(
        &app,
        request(
            Method::PUT,
            "/api/v1/items/beneficiary/B-1",
            Some(&t),
            Some(json!({ "status": "Active", "decided_by": "u-someone-else" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_put_on_missing_item_is_404() {
    let (app, _) = build(vec![]);
    let t = token("u-7", Role::ProgramManager);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/v1/items/program/P-404",
            Some(&t),
            Some(json!({ "status": "Active" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "item_not_found");
}

// ═══════════════════════════════════════════════════════════════════════════
// Create / submit / history
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_submit_and_history_over_http() {
    let (app, _) = build(vec![]);
    let t = token("u-9", Role::DataEntry);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/items/beneficiary",
            Some(&t),
            Some(json!({ "payload": { "name": "Amina", "village": "Kisumu" } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "Draft");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/v1/items/beneficiary/{}/submit", id),
            Some(&t),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Pending Approval");

    let (status, body) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/v1/items/beneficiary/{}/history", id),
            Some(&t),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let events = body["data"]["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["to"], "Draft");
    assert_eq!(events[1]["to"], "Pending Approval");
}

#[tokio::test]
async fn test_viewer_cannot_create() {
    let (app, store) = build(vec![]);
    let t = token("u-3", Role::Viewer);

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/items/program",
            Some(&t),
            Some(json!({ "payload": {}, "submit": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_admin_changes_administrative_status() {
    let mut approved = pending(Variant::Program, "P-1", 0);
    approved.status = Status::Active;
    let (app, _) = build(vec![approved]);
    let t = token("u-1", Role::Admin);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/items/program/P-1/status",
            Some(&t),
            Some(json!({ "status": "Suspended", "reason": "field audit" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "Suspended");

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/items/program/P-1/status",
            Some(&t),
            Some(json!({ "status": "Active" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Active");

    let (_, body) = send(
        &app,
        request(Method::GET, "/api/v1/items/program/P-1/history", Some(&t), None),
    )
    .await;
    let events = body["data"]["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["notes"], "field audit");
}

#[tokio::test]
async fn test_program_manager_cannot_change_administrative_status() {
    let mut approved = pending(Variant::Program, "P-1", 0);
    approved.status = Status::Active;
    let (app, store) = build(vec![approved]);
    let t = token("u-7", Role::ProgramManager);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/items/program/P-1/status",
            Some(&t),
            Some(json!({ "status": "Inactive" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_failure_envelope(&body);

    let stored = store.get(Variant::Program, "P-1").await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Active);
}

#[tokio::test]
async fn test_status_route_cannot_approve_pending_item() {
    let (app, store) = build(vec![pending(Variant::Program, "P-1", 0)]);
    let t = token("u-1", Role::Admin);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/v1/items/program/P-1/status",
            Some(&t),
            Some(json!({ "status": "Active" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_failure_envelope(&body);
    assert_eq!(body["error"]["code"], "invalid_state");

    let stored = store.get(Variant::Program, "P-1").await.unwrap().unwrap();
    assert_eq!(stored.status, Status::PendingApproval);
    assert!(stored.decision.is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// Operational endpoints
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_health_ready_and_metrics_need_no_token() {
    let (app, _) = build(vec![pending(Variant::Beneficiary, "B-1", 0)]);

    let (status, _) = send(&app, request(Method::GET, "/healthz", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, request(Method::GET, "/readyz", None, None)).await;
    assert_eq!(status, StatusCode::OK);

    let t = token("u-7", Role::ProgramManager);
    send(
        &app,
        request(
            Method::PUT,
            "/api/v1/items/beneficiary/B-1",
            Some(&t),
            Some(json!({ "status": "Active" })),
        ),
    )
    .await;

    let (status, body) = send(&app, request(Method::GET, "/metrics", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("mne_decisions_total"), "{text}");
}

#[tokio::test]
async fn test_unknown_api_route_is_404() {
    let (app, _) = build(vec![]);
    for uri in ["/api/v1/nope/nothing/here/at/all", "/not-an-endpoint"] {
        let (status, body) = send(&app, request(Method::GET, uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_failure_envelope(&body);
        assert_eq!(body["error"]["code"], "route_not_found");
    }
}
