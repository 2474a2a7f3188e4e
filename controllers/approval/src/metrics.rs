//! Prometheus metrics for the Approval Controller.
//!
//! Counters live in a registry owned by the controller (not the process-wide
//! default one) and are rendered on `GET /metrics` by the probe server.

use crate::error::ControllerError;
use crate::reconciler::ReconcileOutcome;
use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};

/// Reconciliation counters.
pub struct Metrics {
    registry: Registry,
    reconciliations_total: IntCounterVec,
    reconcile_errors_total: IntCounterVec,
    materializations_total: IntCounterVec,
}

impl Metrics {
    /// Create the counters and register them in a fresh registry.
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconciliations_total = IntCounterVec::new(
            Opts::new("approval_reconciliations_total", "Completed reconciliations by outcome"),
            &["outcome"],
        )?;
        let reconcile_errors_total = IntCounterVec::new(
            Opts::new("approval_reconcile_errors_total", "Failed reconciliations by error kind"),
            &["kind"],
        )?;
        let materializations_total = IntCounterVec::new(
            Opts::new(
                "approval_materializations_total",
                "Approved resources recorded in status, by creation result",
            ),
            &["result"],
        )?;

        registry.register(Box::new(reconciliations_total.clone()))?;
        registry.register(Box::new(reconcile_errors_total.clone()))?;
        registry.register(Box::new(materializations_total.clone()))?;

        Ok(Self {
            registry,
            reconciliations_total,
            reconcile_errors_total,
            materializations_total,
        })
    }

    /// Count a successful reconciliation.
    pub fn record_outcome(&self, outcome: &ReconcileOutcome) {
        self.reconciliations_total
            .with_label_values(&[outcome.label()])
            .inc();

        if let ReconcileOutcome::Materialized { already_existed, .. } = outcome {
            let result = if *already_existed { "already_existed" } else { "created" };
            self.materializations_total.with_label_values(&[result]).inc();
        }
    }

    /// Count a failed reconciliation.
    pub fn record_error(&self, error: &ControllerError) {
        self.reconcile_errors_total
            .with_label_values(&[error.kind()])
            .inc();
    }

    /// Render all counters in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, ControllerError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}
