//! Kubernetes-backed approval store

use crate::error::StoreError;
use crate::store_trait::{ApprovalStore, ResourceScope};
use crate::unstructured::UnstructuredObject;
use crds::Approval;
use kube::api::{Api, DynamicObject, Patch, PatchParams, PostParams};
use kube::discovery::{self, ApiCapabilities, ApiResource, Scope};
use kube::Client;
use tracing::debug;

/// Approval store backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeApprovalStore {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KubeApprovalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeApprovalStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeApprovalStore {
    /// Create a store using `client`, attributing writes to `field_manager`.
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn approvals(&self, namespace: &str) -> Api<Approval> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Resolve the object's kind against the cluster's discovery data.
    async fn discover(&self, object: &UnstructuredObject) -> Result<(ApiResource, ApiCapabilities), StoreError> {
        let gvk = object.group_version_kind();
        discovery::pinned_kind(&self.client, &gvk)
            .await
            .map_err(|e| match e {
                kube::Error::Api(ae) if ae.code == 404 => StoreError::Discovery(format!(
                    "{}/{} is not served by the cluster",
                    object.api_version(),
                    object.kind()
                )),
                other => StoreError::from_kube(other, "API discovery"),
            })
    }

    /// Resolve the dynamic API for the object's kind, honoring its scope.
    async fn dynamic_api(&self, object: &UnstructuredObject) -> Result<Api<DynamicObject>, StoreError> {
        let (resource, capabilities) = self.discover(object).await?;

        let api = match capabilities.scope {
            Scope::Namespaced => {
                let namespace = object.namespace().ok_or_else(|| {
                    StoreError::InvalidRequest(format!("{} is namespaced but has no namespace", object))
                })?;
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
            Scope::Cluster => Api::all_with(self.client.clone(), &resource),
        };
        Ok(api)
    }
}

#[async_trait::async_trait]
impl ApprovalStore for KubeApprovalStore {
    async fn get_approval(&self, namespace: &str, name: &str) -> Result<Option<Approval>, StoreError> {
        self.approvals(namespace)
            .get_opt(name)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("get Approval {}/{}", namespace, name)))
    }

    async fn update_approval_status(&self, approval: &Approval) -> Result<Approval, StoreError> {
        let name = approval
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| StoreError::InvalidRequest("Approval missing name".to_string()))?;
        let namespace = approval
            .metadata
            .namespace
            .as_deref()
            .ok_or_else(|| StoreError::InvalidRequest(format!("Approval {} missing namespace", name)))?;
        let resource_version = approval.metadata.resource_version.as_deref().ok_or_else(|| {
            StoreError::InvalidRequest(format!("Approval {}/{} missing resourceVersion", namespace, name))
        })?;

        // A merge patch carrying resourceVersion is rejected with 409 when the
        // stored object has changed since it was read.
        let status_patch = serde_json::json!({
            "metadata": { "resourceVersion": resource_version },
            "status": approval.status,
        });

        debug!(
            "Writing status for Approval {}/{} at resourceVersion {}",
            namespace, name, resource_version
        );

        let pp = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..PatchParams::default()
        };
        self.approvals(namespace)
            .patch_status(name, &pp, &Patch::Merge(&status_patch))
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("update Approval {}/{} status", namespace, name)))
    }

    async fn resource_scope(&self, object: &UnstructuredObject) -> Result<ResourceScope, StoreError> {
        let (_, capabilities) = self.discover(object).await?;
        Ok(match capabilities.scope {
            Scope::Namespaced => ResourceScope::Namespaced,
            Scope::Cluster => ResourceScope::Cluster,
        })
    }

    async fn create_resource(&self, object: &UnstructuredObject) -> Result<(), StoreError> {
        let api = self.dynamic_api(object).await?;
        let dynamic = object.to_dynamic_object()?;

        let pp = PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..PostParams::default()
        };
        api.create(&pp, &dynamic)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("create {}", object)))?;

        debug!("Created {}", object);
        Ok(())
    }
}
