//! Reconciliation logic for Approval CRDs.
//!
//! Every invocation starts from a freshly fetched record and decides what to
//! do from its current fields alone:
//!
//! 1. record gone: nothing to do
//! 2. no state yet: stamp `Pending` and stop (the write triggers a new pass)
//! 3. `Approved` without a materialized resource: decode the embedded
//!    specification, place it in the record's namespace unless its kind is
//!    cluster-scoped, create it, and record the reference
//! 4. anything else: nothing to do
//!
//! Status writes are conditional on the fetched `resourceVersion`, so a pass
//! that raced with an approver fails with a conflict and is retried against
//! the new state instead of overwriting it.

use crate::error::ControllerError;
use approval_store::{ApprovalStore, ResourceScope, UnstructuredObject};
use chrono::Utc;
use crds::{
    Approval, ApprovalCondition, ApprovalState, ApprovalStatus, ConditionStatus, ResourceReference,
    CONDITION_MATERIALIZED, REASON_INVALID_RESOURCE_SPECIFICATION, REASON_MATERIALIZATION_FAILED,
    REASON_RESOURCE_ALREADY_EXISTS, REASON_RESOURCE_CREATED,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a single reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record no longer exists
    NotFound,

    /// The record had no state and was stamped `Pending`
    Initialized,

    /// The approved resource was created (or found already present) and recorded
    Materialized {
        /// Reference written to the status
        reference: ResourceReference,
        /// True if creation reported that the resource already existed
        already_existed: bool,
    },

    /// Nothing to do
    Unchanged,
}

impl ReconcileOutcome {
    /// Short label for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Initialized => "initialized",
            Self::Materialized { .. } => "materialized",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Reconciles Approval resources.
pub struct Reconciler {
    store: Arc<dyn ApprovalStore>,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(store: Arc<dyn ApprovalStore>) -> Self {
        Self { store }
    }

    /// Reconciles the Approval `namespace/name`.
    ///
    /// Errors are meant to be retried by the caller; no step retries
    /// internally.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        info!("Reconciling Approval {}/{}", namespace, name);

        let Some(mut approval) = self.store.get_approval(namespace, name).await? else {
            debug!("Approval {}/{} no longer exists", namespace, name);
            return Ok(ReconcileOutcome::NotFound);
        };

        if approval.state().is_unset() {
            approval
                .status
                .get_or_insert_with(ApprovalStatus::default)
                .state = ApprovalState::Pending;

            self.store.update_approval_status(&approval).await.map_err(|e| {
                error!("Failed to initialize Approval {}/{} status: {}", namespace, name, e);
                e
            })?;

            info!("Approval {}/{} initialized as Pending", namespace, name);
            return Ok(ReconcileOutcome::Initialized);
        }

        if !approval.awaiting_materialization() {
            debug!(
                "Approval {}/{} needs no action (state: {}, materialized: {})",
                namespace,
                name,
                approval.state(),
                approval.materialized_resource().is_some()
            );
            return Ok(ReconcileOutcome::Unchanged);
        }

        self.materialize(approval, namespace, name).await
    }

    /// Creates the approved resource and records it in the status.
    async fn materialize(
        &self,
        mut approval: Approval,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ControllerError> {
        info!("Approval {}/{} is approved and has no resource yet", namespace, name);

        let mut object = UnstructuredObject::from_value(approval.spec.resource_specification.clone()).map_err(|e| {
            error!("Unable to decode resource specification of Approval {}/{}: {}", namespace, name, e);
            ControllerError::Decode(e)
        })?;

        let scope = self.store.resource_scope(&object).await.map_err(|e| {
            error!("Unable to resolve scope of {} for Approval {}/{}: {}", object, namespace, name, e);
            e
        })?;
        match scope {
            ResourceScope::Namespaced if object.namespace().is_none() => object.set_namespace(namespace),
            ResourceScope::Namespaced => {}
            ResourceScope::Cluster => object.clear_namespace(),
        }

        let already_existed = match self.store.create_resource(&object).await {
            Ok(()) => {
                info!("Created {} for Approval {}/{}", object, namespace, name);
                false
            }
            Err(e) if e.is_already_exists() => {
                // A previous pass created it but did not get to record it
                warn!(
                    "{} already exists, recording it for Approval {}/{}",
                    object, namespace, name
                );
                true
            }
            Err(e) => {
                error!("Unable to create {} for Approval {}/{}: {}", object, namespace, name, e);
                return Err(e.into());
            }
        };

        let reference = object.to_reference();
        let (reason, message) = if already_existed {
            (REASON_RESOURCE_ALREADY_EXISTS, format!("{} already existed", reference))
        } else {
            (REASON_RESOURCE_CREATED, format!("Created {}", reference))
        };
        let generation = approval.metadata.generation;

        let status = approval.status.get_or_insert_with(ApprovalStatus::default);
        status.materialized_resource_ref = Some(reference.clone());
        status.decision_time.get_or_insert_with(Utc::now);
        status.set_condition(
            ApprovalCondition::new(CONDITION_MATERIALIZED, ConditionStatus::True, reason, message)
                .observed_at(generation),
        );

        self.store.update_approval_status(&approval).await.map_err(|e| {
            error!(
                "Unable to record {} in Approval {}/{} status: {}",
                reference, namespace, name, e
            );
            e
        })?;

        info!("Approval {}/{} materialized as {}", namespace, name, reference);
        Ok(ReconcileOutcome::Materialized {
            reference,
            already_existed,
        })
    }

    /// Surfaces a persistent failure as a `Materialized=False` condition.
    ///
    /// Only records still waiting for materialization are touched, and only the
    /// conditions change. Returns whether a status write happened.
    pub async fn record_failure(
        &self,
        namespace: &str,
        name: &str,
        failure: &ControllerError,
    ) -> Result<bool, ControllerError> {
        let Some(mut approval) = self.store.get_approval(namespace, name).await? else {
            return Ok(false);
        };
        if !approval.awaiting_materialization() {
            return Ok(false);
        }

        let reason = match failure {
            ControllerError::Decode(_) => REASON_INVALID_RESOURCE_SPECIFICATION,
            _ => REASON_MATERIALIZATION_FAILED,
        };
        let condition = ApprovalCondition::new(
            CONDITION_MATERIALIZED,
            ConditionStatus::False,
            reason,
            failure.to_string(),
        )
        .observed_at(approval.metadata.generation);

        let changed = approval
            .status
            .get_or_insert_with(ApprovalStatus::default)
            .set_condition(condition);
        if !changed {
            return Ok(false);
        }

        self.store.update_approval_status(&approval).await?;
        warn!(
            "Approval {}/{} marked {}=False ({}): {}",
            namespace, name, CONDITION_MATERIALIZED, reason, failure
        );
        Ok(true)
    }
}
