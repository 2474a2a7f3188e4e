//! Mock ApprovalStore for unit testing
//!
//! Keeps approvals and created resources in memory and mimics the API server
//! behaviors the reconciler depends on:
//! - every successful write bumps `metadata.resourceVersion`
//! - a status write carrying a stale `resourceVersion` fails with `Conflict`
//! - creating an object that already exists fails with `AlreadyExists`
//! - cluster-scoped kinds are stored without a namespace
//!
//! Failures can be injected for the next status write or creation to simulate
//! crashes and transient outages.

use crate::error::StoreError;
use crate::store_trait::{ApprovalStore, ResourceScope};
use crate::unstructured::UnstructuredObject;
use crds::{Approval, ApprovalState, ApprovalStatus};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

type RecordKey = (String, String);
type ResourceKey = (String, String, Option<String>, String);

/// Kinds reported as cluster-scoped without registration
const CLUSTER_SCOPED_KINDS: &[(&str, &str)] = &[
    ("v1", "Namespace"),
    ("v1", "Node"),
    ("v1", "PersistentVolume"),
    ("rbac.authorization.k8s.io/v1", "ClusterRole"),
    ("rbac.authorization.k8s.io/v1", "ClusterRoleBinding"),
    ("apiextensions.k8s.io/v1", "CustomResourceDefinition"),
];

#[derive(Debug, Default)]
struct MockState {
    approvals: HashMap<RecordKey, Approval>,
    resources: HashMap<ResourceKey, UnstructuredObject>,
    created: Vec<UnstructuredObject>,
    cluster_kinds: HashSet<(String, String)>,
    next_resource_version: u64,
    get_calls: usize,
    create_calls: usize,
    status_writes: usize,
    fail_next_status_update: bool,
    fail_next_create: bool,
}

impl MockState {
    fn scope_of(&self, object: &UnstructuredObject) -> ResourceScope {
        let builtin = CLUSTER_SCOPED_KINDS
            .iter()
            .any(|(api_version, kind)| *api_version == object.api_version() && *kind == object.kind());
        let registered = self
            .cluster_kinds
            .contains(&(object.api_version().to_string(), object.kind().to_string()));
        if builtin || registered {
            ResourceScope::Cluster
        } else {
            ResourceScope::Namespaced
        }
    }

    fn bump_resource_version(&mut self) -> String {
        self.next_resource_version += 1;
        self.next_resource_version.to_string()
    }
}

/// In-memory approval store for tests
#[derive(Clone, Debug, Default)]
pub struct MockApprovalStore {
    state: Arc<Mutex<MockState>>,
}

fn record_key(approval: &Approval) -> RecordKey {
    (
        approval.metadata.namespace.clone().unwrap_or_default(),
        approval.metadata.name.clone().unwrap_or_default(),
    )
}

fn resource_key(object: &UnstructuredObject) -> ResourceKey {
    (
        object.api_version().to_string(),
        object.kind().to_string(),
        object.namespace().map(str::to_string),
        object.name().to_string(),
    )
}

impl MockApprovalStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an approval (for test setup), stamping a fresh resourceVersion.
    ///
    /// Returns the stored copy.
    pub fn insert_approval(&self, mut approval: Approval) -> Approval {
        let mut state = self.state.lock().unwrap();
        approval.metadata.resource_version = Some(state.bump_resource_version());
        state.approvals.insert(record_key(&approval), approval.clone());
        approval
    }

    /// Remove an approval, as if deleted by another actor
    pub fn delete_approval(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .approvals
            .remove(&(namespace.to_string(), name.to_string()));
    }

    /// Current stored copy of an approval
    pub fn approval(&self, namespace: &str, name: &str) -> Option<Approval> {
        self.state
            .lock()
            .unwrap()
            .approvals
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Change an approval's state, as an approver would
    pub fn set_state(&self, namespace: &str, name: &str, new_state: ApprovalState) {
        let mut state = self.state.lock().unwrap();
        let resource_version = state.bump_resource_version();
        if let Some(approval) = state.approvals.get_mut(&(namespace.to_string(), name.to_string())) {
            approval
                .status
                .get_or_insert_with(ApprovalStatus::default)
                .state = new_state;
            approval.metadata.resource_version = Some(resource_version);
        }
    }

    /// Register a resource as already present in the cluster (for test setup)
    pub fn insert_resource(&self, object: UnstructuredObject) {
        self.state
            .lock()
            .unwrap()
            .resources
            .insert(resource_key(&object), object);
    }

    /// Treat `api_version`/`kind` as cluster-scoped
    pub fn register_cluster_kind(&self, api_version: &str, kind: &str) {
        self.state
            .lock()
            .unwrap()
            .cluster_kinds
            .insert((api_version.to_string(), kind.to_string()));
    }

    /// Look up a resource present in the cluster
    pub fn resource(&self, api_version: &str, kind: &str, namespace: Option<&str>, name: &str) -> Option<UnstructuredObject> {
        let key = (
            api_version.to_string(),
            kind.to_string(),
            namespace.map(str::to_string),
            name.to_string(),
        );
        self.state.lock().unwrap().resources.get(&key).cloned()
    }

    /// Resources created through `create_resource`, in order
    pub fn created_resources(&self) -> Vec<UnstructuredObject> {
        self.state.lock().unwrap().created.clone()
    }

    /// Number of `get_approval` calls
    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls
    }

    /// Number of `create_resource` calls, including rejected ones
    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    /// Number of successful status writes
    pub fn status_writes(&self) -> usize {
        self.state.lock().unwrap().status_writes
    }

    /// Make the next status write fail with `Unavailable`
    pub fn fail_next_status_update(&self) {
        self.state.lock().unwrap().fail_next_status_update = true;
    }

    /// Make the next creation fail with `Unavailable`
    pub fn fail_next_create(&self) {
        self.state.lock().unwrap().fail_next_create = true;
    }
}

#[async_trait::async_trait]
impl ApprovalStore for MockApprovalStore {
    async fn get_approval(&self, namespace: &str, name: &str) -> Result<Option<Approval>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        Ok(state
            .approvals
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn update_approval_status(&self, approval: &Approval) -> Result<Approval, StoreError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_status_update) {
            return Err(StoreError::Unavailable("injected status update failure".to_string()));
        }

        let key = record_key(approval);
        let resource_version = state.bump_resource_version();
        let stored = state
            .approvals
            .get_mut(&key)
            .ok_or_else(|| StoreError::InvalidRequest(format!("Approval {}/{} not found", key.0, key.1)))?;

        if stored.metadata.resource_version != approval.metadata.resource_version {
            return Err(StoreError::Conflict(format!(
                "Approval {}/{}: resourceVersion {:?} is stale (stored {:?})",
                key.0, key.1, approval.metadata.resource_version, stored.metadata.resource_version
            )));
        }

        stored.status = approval.status.clone();
        stored.metadata.resource_version = Some(resource_version);
        let updated = stored.clone();
        state.status_writes += 1;
        Ok(updated)
    }

    async fn resource_scope(&self, object: &UnstructuredObject) -> Result<ResourceScope, StoreError> {
        Ok(self.state.lock().unwrap().scope_of(object))
    }

    async fn create_resource(&self, object: &UnstructuredObject) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        if std::mem::take(&mut state.fail_next_create) {
            return Err(StoreError::Unavailable("injected create failure".to_string()));
        }

        // The API server ignores the namespace of cluster-scoped objects
        let mut object = object.clone();
        if state.scope_of(&object) == ResourceScope::Cluster {
            object.clear_namespace();
        }

        let key = resource_key(&object);
        if state.resources.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("{} already exists", object)));
        }
        state.resources.insert(key, object.clone());
        state.created.push(object);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::ApprovalSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;

    fn approval(namespace: &str, name: &str) -> Approval {
        Approval {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: ApprovalSpec {
                resource_specification: json!({}),
                authorized_roles: vec!["admin".to_string()],
                metadata: Default::default(),
            },
            status: None,
        }
    }

    fn config_map(name: &str, namespace: &str) -> UnstructuredObject {
        UnstructuredObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": namespace}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_stale_status_write_conflicts() {
        let store = MockApprovalStore::new();
        let stored = store.insert_approval(approval("team-a", "a"));

        store.set_state("team-a", "a", ApprovalState::Approved);

        let mut stale = stored.clone();
        stale.status = Some(ApprovalStatus {
            state: ApprovalState::Pending,
            ..Default::default()
        });
        let err = store.update_approval_status(&stale).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.status_writes(), 0);
        assert_eq!(store.approval("team-a", "a").unwrap().state(), ApprovalState::Approved);
    }

    #[tokio::test]
    async fn test_status_write_bumps_resource_version() {
        let store = MockApprovalStore::new();
        let mut stored = store.insert_approval(approval("team-a", "a"));
        stored.status = Some(ApprovalStatus {
            state: ApprovalState::Pending,
            ..Default::default()
        });

        let updated = store.update_approval_status(&stored).await.unwrap();

        assert_ne!(updated.metadata.resource_version, stored.metadata.resource_version);
        assert_eq!(updated.state(), ApprovalState::Pending);
        assert_eq!(store.status_writes(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_reports_already_exists() {
        let store = MockApprovalStore::new();
        store.create_resource(&config_map("cm", "team-a")).await.unwrap();

        let err = store.create_resource(&config_map("cm", "team-a")).await.unwrap_err();

        assert!(err.is_already_exists());
        assert_eq!(store.create_calls(), 2);
        assert_eq!(store.created_resources().len(), 1);
        assert!(store.resource("v1", "ConfigMap", Some("team-a"), "cm").is_some());
    }

    #[tokio::test]
    async fn test_cluster_scoped_kinds_are_stored_without_namespace() {
        let store = MockApprovalStore::new();
        let namespace = UnstructuredObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "new-ns", "namespace": "team-a"}
        }))
        .unwrap();

        assert_eq!(store.resource_scope(&namespace).await.unwrap(), ResourceScope::Cluster);
        assert_eq!(
            store.resource_scope(&config_map("cm", "team-a")).await.unwrap(),
            ResourceScope::Namespaced
        );

        store.create_resource(&namespace).await.unwrap();
        assert!(store.resource("v1", "Namespace", None, "new-ns").is_some());
        assert_eq!(store.created_resources()[0].namespace(), None);
    }

    #[tokio::test]
    async fn test_registered_cluster_kind() {
        let store = MockApprovalStore::new();
        let tenant = UnstructuredObject::from_value(json!({
            "apiVersion": "example.com/v1",
            "kind": "Tenant",
            "metadata": {"name": "acme"}
        }))
        .unwrap();
        assert_eq!(store.resource_scope(&tenant).await.unwrap(), ResourceScope::Namespaced);

        store.register_cluster_kind("example.com/v1", "Tenant");

        assert_eq!(store.resource_scope(&tenant).await.unwrap(), ResourceScope::Cluster);
    }

    #[tokio::test]
    async fn test_injected_failures_fire_once() {
        let store = MockApprovalStore::new();
        store.fail_next_create();

        assert!(matches!(
            store.create_resource(&config_map("cm", "team-a")).await,
            Err(StoreError::Unavailable(_))
        ));
        store.create_resource(&config_map("cm", "team-a")).await.unwrap();
    }
}
