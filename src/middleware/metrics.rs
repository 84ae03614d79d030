//! Prometheus metrics for the approval workflow.
//!
//! Exposes a standard `/metrics` endpoint that Prometheus can scrape.
//! Metrics live in a registry owned by the recorder rather than the global
//! default one, so several workflows (e.g. in tests) can coexist.

use prometheus::{opts, CounterVec, Encoder, Registry, TextEncoder};

use crate::errors::AppError;
use crate::models::{Outcome, Status, Variant};

pub struct WorkflowMetrics {
    registry: Registry,
    decisions_total: CounterVec,
    transitions_total: CounterVec,
    failures_total: CounterVec,
}

impl WorkflowMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let decisions_total = CounterVec::new(
            opts!("mne_decisions_total", "Approval decisions applied"),
            &["variant", "outcome"],
        )?;
        let transitions_total = CounterVec::new(
            opts!("mne_status_transitions_total", "Status changes written to the store"),
            &["variant", "to"],
        )?;
        let failures_total = CounterVec::new(
            opts!("mne_workflow_failures_total", "Workflow operations that failed, by error kind"),
            &["operation", "kind"],
        )?;

        registry.register(Box::new(decisions_total.clone()))?;
        registry.register(Box::new(transitions_total.clone()))?;
        registry.register(Box::new(failures_total.clone()))?;

        Ok(Self {
            registry,
            decisions_total,
            transitions_total,
            failures_total,
        })
    }

    pub fn record_decision(&self, variant: Variant, outcome: Outcome) {
        self.decisions_total
            .with_label_values(&[variant.as_str(), outcome.as_str()])
            .inc();
    }

    pub fn record_transition(&self, variant: Variant, to: Status) {
        self.transitions_total
            .with_label_values(&[variant.as_str(), to.as_str()])
            .inc();
    }

    pub fn record_failure(&self, operation: &str, err: &AppError) {
        self.failures_total
            .with_label_values(&[operation, err.kind()])
            .inc();
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
