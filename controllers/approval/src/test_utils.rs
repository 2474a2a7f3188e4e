//! Test utilities for unit testing the controller
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::reconciler::Reconciler;
use approval_store::MockApprovalStore;
use crds::{Approval, ApprovalSpec, ApprovalState, ApprovalStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{json, Value};
use std::sync::Arc;

/// Helper to create a test Deployment manifest
pub fn deployment_manifest(name: &str, namespace: Option<&str>) -> Value {
    let mut manifest = json!({
        "apiVersion": "v1",
        "kind": "Deployment",
        "metadata": {"name": name},
        "spec": {
            "replicas": 1,
            "template": {"spec": {"containers": [{"name": "app", "image": "nginx:1.27"}]}}
        }
    });
    if let Some(ns) = namespace {
        manifest["metadata"]["namespace"] = json!(ns);
    }
    manifest
}

/// Helper to create a test Approval CRD
pub fn create_test_approval(
    name: &str,
    namespace: &str,
    resource_specification: Value,
    state: Option<ApprovalState>,
) -> Approval {
    Approval {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            generation: Some(1),
            ..Default::default()
        },
        spec: ApprovalSpec {
            resource_specification,
            authorized_roles: vec!["platform-admin".to_string()],
            metadata: [("requester".to_string(), "dev-team".to_string())].into_iter().collect(),
        },
        status: state.map(|state| ApprovalStatus {
            state,
            ..Default::default()
        }),
    }
}

/// Helper to create a reconciler backed by `store`
pub fn create_test_reconciler(store: &MockApprovalStore) -> Reconciler {
    Reconciler::new(Arc::new(store.clone()))
}
