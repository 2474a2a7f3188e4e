//! Controller-specific error types.
//!
//! This module defines error types specific to the Approval Controller
//! that are not covered by upstream library errors.

use approval_store::{DecodeError, StoreError};
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Approval Controller.
///
/// Every reconcile error is handed back to the scheduler, which retries the
/// record with backoff.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Record store error (fetch, status write or resource creation)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Embedded resource specification could not be decoded
    #[error("Invalid resource specification: {0}")]
    Decode(#[from] DecodeError),

    /// Kubernetes client error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Watched object lacks a namespace or name
    #[error("Object key missing: {0}")]
    MissingObjectKey(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Probe server I/O error
    #[error("Probe server error: {0}")]
    Server(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(StoreError::Conflict(_)) => "conflict",
            Self::Store(StoreError::AlreadyExists(_)) => "already_exists",
            Self::Store(_) => "store",
            Self::Decode(_) => "decode",
            Self::Kube(_) => "kube",
            Self::InvalidConfig(_) => "config",
            Self::MissingObjectKey(_) => "object_key",
            Self::Metrics(_) => "metrics",
            Self::Server(_) => "server",
            Self::Watch(_) => "watch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(ControllerError::from(StoreError::Conflict("stale".into())).kind(), "conflict");
        assert_eq!(ControllerError::from(StoreError::Unavailable("down".into())).kind(), "store");
        assert_eq!(ControllerError::from(DecodeError::MissingField("kind")).kind(), "decode");
    }
}
