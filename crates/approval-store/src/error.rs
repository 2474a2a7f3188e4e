//! Approval store errors

use crate::unstructured::DecodeError;
use thiserror::Error;

/// Errors that can occur when talking to the record store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes client error (transport, timeouts, unexpected API status)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// API server reported a server-side failure; safe to retry
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Optimistic concurrency check failed (stale resourceVersion)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource to create already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Kind is not served by the cluster
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Object could not be converted for the API
    #[error("Invalid object: {0}")]
    InvalidObject(#[from] DecodeError),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request (e.g., record missing name or resourceVersion)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    /// Classify an API error returned for `what`.
    ///
    /// 409 responses are split into `AlreadyExists` (creation) and `Conflict`
    /// (stale write); 5xx responses become `Unavailable`.
    pub fn from_kube(err: kube::Error, what: &str) -> Self {
        match &err {
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::AlreadyExists(format!("{}: {}", what, ae.message))
            }
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict(format!("{}: {}", what, ae.message)),
            kube::Error::Api(ae) if ae.code >= 500 => Self::Unavailable(format!("{}: {}", what, ae.message)),
            _ => Self::Kube(err),
        }
    }

    /// True for "the object is already there" failures on creation
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// True for lost optimistic-concurrency races
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
