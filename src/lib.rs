//! M&E Registry: approval workflow service for beneficiaries, programs and activities.
//!
//! The binary in `main.rs` wires configuration, tracing and the HTTP server;
//! everything it serves lives here so integration tests in `tests/` can
//! drive the same code.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod store;
pub mod workflow;

use middleware::auth::{AuthProvider, JwtAuthProvider};
use middleware::metrics::WorkflowMetrics;
use store::EntityStore;
use workflow::gate::AuthorizationGate;
use workflow::ApprovalWorkflow;

/// Shared application state passed to handlers.
pub struct AppState {
    pub workflow: ApprovalWorkflow,
    pub auth: Arc<dyn AuthProvider>,
    pub config: config::Config,
}

impl AppState {
    pub fn new(config: config::Config, store: Arc<dyn EntityStore>) -> anyhow::Result<Self> {
        let metrics = Arc::new(WorkflowMetrics::new()?);
        let gate = AuthorizationGate::new(config.approver_roles.clone());
        let auth = Arc::new(JwtAuthProvider::new(&config.jwt_secret));
        Ok(Self {
            workflow: ApprovalWorkflow::new(store, gate, metrics),
            auth,
            config,
        })
    }
}
