//! Kubernetes object references for materialized resources
//!
//! Follows the Kubernetes `ObjectReference` shape (apiVersion, kind, name,
//! namespace), restricted to the fields an approval records about the
//! resource it created.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a resource created from an approved `Approval`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    /// API group and version of the referenced resource (e.g., "apps/v1")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    /// Kind of the referenced resource (e.g., "Deployment")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Name of the referenced resource
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Namespace of the referenced resource (absent for cluster-scoped kinds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceReference {
    /// Create a reference to a cluster-scoped resource
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    /// Create a reference to a namespaced resource
    pub fn with_namespace(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::new(api_version, kind, name)
        }
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_omits_empty_fields() {
        let reference = ResourceReference::new("v1", "Namespace", "team-a");
        let json = serde_json::to_value(&reference).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"apiVersion": "v1", "kind": "Namespace", "name": "team-a"})
        );
    }

    #[test]
    fn test_reference_display() {
        let reference = ResourceReference::with_namespace("apps/v1", "Deployment", "web", "prod");
        assert_eq!(reference.to_string(), "Deployment prod/web");
    }
}
