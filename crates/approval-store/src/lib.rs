//! Approval record store
//!
//! Access layer between the approval controller and the Kubernetes API server:
//!
//! - [`ApprovalStore`]: the operations the reconciler needs (fetch a record,
//!   write its status with optimistic concurrency, create the approved resource)
//! - [`KubeApprovalStore`]: implementation backed by a `kube::Client`
//! - [`UnstructuredObject`]: decoder for the opaque resource specification
//!   embedded in an `Approval`
//! - `MockApprovalStore` (feature `test-util`): in-memory store for unit tests
//!
//! # Example
//!
//! ```no_run
//! use approval_store::{ApprovalStore, KubeApprovalStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeApprovalStore::new(client, "approval-controller");
//!
//! if let Some(approval) = store.get_approval("team-a", "deploy-web").await? {
//!     println!("state: {}", approval.state());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod store_trait;
pub mod unstructured;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeApprovalStore;
pub use error::StoreError;
pub use store_trait::{ApprovalStore, ResourceScope};
pub use unstructured::{DecodeError, UnstructuredObject};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockApprovalStore;
