//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the record store,
//! reconciler, watcher and probe server together for the Approval Controller.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::probes::{self, ProbeState};
use crate::reconciler::Reconciler;
use crate::watcher::{Context, Watcher};
use approval_store::KubeApprovalStore;
use kube::Client;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for Approval gating.
pub struct Controller {
    approval_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Approval Controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        let store = KubeApprovalStore::new(kube_client.clone(), config.field_manager.clone());
        let reconciler = Arc::new(Reconciler::new(Arc::new(store)));
        let metrics = Arc::new(Metrics::new()?);
        let ready = Arc::new(AtomicBool::new(false));

        let context = Arc::new(Context::new(reconciler, metrics.clone(), &config));
        let watcher = Watcher::new(kube_client, config.namespace.clone(), context, ready.clone());

        let probe_state = ProbeState { ready, metrics };
        let probe_addr = config.probe_addr;

        // Start watcher and probe server in background tasks
        let approval_watcher = tokio::spawn(async move { watcher.watch_approvals().await });
        let probe_server = tokio::spawn(async move { probes::serve(probe_addr, probe_state).await });

        Ok(Self {
            approval_watcher,
            probe_server,
        })
    }

    /// Runs the controller until shutdown.
    ///
    /// Returns when the watcher stops (shutdown signal) or either task fails.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Approval Controller running");

        tokio::select! {
            result = &mut self.approval_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Approval watcher panicked: {}", e)))??;
            }
            result = &mut self.probe_server => {
                result.map_err(|e| ControllerError::Watch(format!("Probe server panicked: {}", e)))??;
            }
        }

        self.probe_server.abort();
        info!("Approval Controller stopped");
        Ok(())
    }
}
