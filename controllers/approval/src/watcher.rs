//! Kubernetes resource watcher.
//!
//! Drives the reconciler from `kube_runtime::Controller`: every change to an
//! Approval (spec or status) schedules a reconcile of that record, at most one
//! per record at a time. Failed records are retried with a per-record
//! Fibonacci backoff, and after enough consecutive failures the error is
//! surfaced on the record as a `Materialized=False` condition.

use crate::backoff::FibonacciBackoff;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crds::Approval;
use futures::StreamExt;
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::Action;
use kube_runtime::{watcher, Controller as RuntimeController};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Backoff state for a record
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(min: Duration, max: Duration) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min, max),
            error_count: 0,
        }
    }
}

/// Shared state handed to every reconcile and error-policy invocation.
pub struct Context {
    /// Reconciler shared by all records
    pub reconciler: Arc<Reconciler>,
    /// Reconciliation counters
    pub metrics: Arc<Metrics>,
    resync_interval: Duration,
    backoff_min: Duration,
    backoff_max: Duration,
    failure_condition_threshold: u32,
    /// Error tracking per record (namespace/name -> BackoffState)
    backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl Context {
    /// Creates a context with an empty backoff table.
    pub fn new(reconciler: Arc<Reconciler>, metrics: Arc<Metrics>, config: &ControllerConfig) -> Self {
        Self {
            reconciler,
            metrics,
            resync_interval: config.resync_interval,
            backoff_min: config.backoff_min,
            backoff_max: config.backoff_max,
            failure_condition_threshold: config.failure_condition_threshold,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Next retry delay for a record
    fn next_backoff(&self, key: &str) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => states
                .entry(key.to_string())
                .or_insert_with(|| BackoffState::new(self.backoff_min, self.backoff_max))
                .backoff
                .next_backoff(),
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using minimum backoff", e);
                self.backoff_min
            }
        }
    }

    /// Increment the consecutive failure count for a record, returning the new count
    fn increment_error(&self, key: &str) -> u32 {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(key.to_string())
                    .or_insert_with(|| BackoffState::new(self.backoff_min, self.backoff_max));
                state.error_count += 1;
                state.error_count
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}", e);
                0
            }
        }
    }

    /// Drop a record's backoff state (on success or once the record is gone)
    fn forget(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked_records(&self) -> usize {
        self.backoff_states.lock().unwrap().len()
    }

    #[cfg(test)]
    fn error_count(&self, key: &str) -> u32 {
        self.backoff_states
            .lock()
            .unwrap()
            .get(key)
            .map_or(0, |state| state.error_count)
    }
}

fn object_key(approval: &Approval) -> Result<(String, String), ControllerError> {
    let namespace = approval
        .namespace()
        .ok_or_else(|| ControllerError::MissingObjectKey(format!("Approval {} has no namespace", approval.name_any())))?;
    Ok((namespace, approval.name_any()))
}

/// Reconcile entry point for `kube_runtime::Controller`.
pub async fn reconcile(approval: Arc<Approval>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let (namespace, name) = object_key(&approval)?;
    let key = format!("{}/{}", namespace, name);

    match ctx.reconciler.reconcile(&namespace, &name).await {
        Ok(outcome) => {
            debug!("Approval {} reconciled: {}", key, outcome.label());
            ctx.metrics.record_outcome(&outcome);
            ctx.forget(&key);
            Ok(Action::requeue(ctx.resync_interval))
        }
        Err(e) => {
            let error_count = ctx.increment_error(&key);
            if ctx.failure_condition_threshold > 0 && error_count >= ctx.failure_condition_threshold {
                match ctx.reconciler.record_failure(&namespace, &name, &e).await {
                    Ok(true) => info!(
                        "Approval {} failed {} times in a row, failure recorded in status",
                        key, error_count
                    ),
                    Ok(false) => {}
                    Err(record_err) => warn!("Unable to record failure on Approval {}: {}", key, record_err),
                }
            }
            Err(e)
        }
    }
}

/// Error policy: requeue the record with Fibonacci backoff.
pub fn error_policy(approval: Arc<Approval>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    ctx.metrics.record_error(error);

    let key = match object_key(&approval) {
        Ok((namespace, name)) => format!("{}/{}", namespace, name),
        Err(_) => approval.name_any(),
    };
    let delay = ctx.next_backoff(&key);
    error!(
        "Reconciliation of Approval {} failed ({}), retrying in {}s: {}",
        key,
        error.kind(),
        delay.as_secs(),
        error
    );
    Action::requeue(delay)
}

/// Watches Approval resources and feeds them to the reconciler.
pub struct Watcher {
    client: Client,
    namespace: Option<String>,
    context: Arc<Context>,
    ready: Arc<AtomicBool>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(client: Client, namespace: Option<String>, context: Arc<Context>, ready: Arc<AtomicBool>) -> Self {
        Self {
            client,
            namespace,
            context,
            ready,
        }
    }

    /// Starts watching Approval resources; returns on shutdown signal.
    pub async fn watch_approvals(&self) -> Result<(), ControllerError> {
        let api: Api<Approval> = match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };

        info!(
            "Starting Approval watcher ({})",
            self.namespace.as_deref().unwrap_or("all namespaces")
        );

        let controller = RuntimeController::new(api, watcher::Config::default())
            .shutdown_on_signal()
            .run(reconcile, error_policy, self.context.clone());
        self.ready.store(true, Ordering::Release);

        controller
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled Approval {}", obj),
                    Err(e) => debug!("Approval controller stream error: {}", e),
                }
            })
            .await;

        self.ready.store(false, Ordering::Release);
        info!("Approval watcher stopped");
        Ok(())
    }
}
