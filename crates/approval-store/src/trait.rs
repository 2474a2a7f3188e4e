//! ApprovalStore trait for mocking
//!
//! This trait abstracts the record store so the reconciler can be unit tested
//! against an in-memory implementation. `KubeApprovalStore` implements it
//! against the API server.

use crate::error::StoreError;
use crate::unstructured::UnstructuredObject;
use crds::Approval;

/// Whether a kind lives inside a namespace or at cluster level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
    /// Objects carry a namespace
    Namespaced,
    /// Objects have no namespace (e.g. `Namespace`, `ClusterRole`)
    Cluster,
}

/// Operations the reconciler performs against the record store.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Fetch an approval. `Ok(None)` means it does not exist (e.g. deleted).
    async fn get_approval(&self, namespace: &str, name: &str) -> Result<Option<Approval>, StoreError>;

    /// Write the status subresource of `approval`.
    ///
    /// The write is conditional on `approval.metadata.resource_version`; if the
    /// stored record has moved on, the call fails with [`StoreError::Conflict`]
    /// and nothing is written.
    async fn update_approval_status(&self, approval: &Approval) -> Result<Approval, StoreError>;

    /// Look up the scope of `object`'s kind.
    ///
    /// Fails with [`StoreError::Discovery`] if the kind is not served.
    async fn resource_scope(&self, object: &UnstructuredObject) -> Result<ResourceScope, StoreError>;

    /// Create the resource described by `object`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if an object with the same
    /// kind, namespace and name is already present.
    async fn create_resource(&self, object: &UnstructuredObject) -> Result<(), StoreError>;
}
