//! Approval CRD
//!
//! Holds an arbitrary resource specification until an approver flips the
//! status to `Approved`, after which the controller creates the resource once.

use crate::conditions::{set_condition, ApprovalCondition};
use crate::references::ResourceReference;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "acp.ag.ch",
    version = "v1",
    kind = "Approval",
    namespaced,
    status = "ApprovalStatus",
    shortname = "apv",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSpec {
    /// Manifest of the resource to create once approved.
    ///
    /// Kept as an untyped document; it must declare its own `apiVersion`,
    /// `kind` and `metadata.name`.
    #[serde(alias = "resourceSpec")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub resource_specification: serde_json::Value,

    /// Roles allowed to approve this resource (enforced by admission, not here)
    #[serde(alias = "roles")]
    #[schemars(length(min = 1))]
    pub authorized_roles: Vec<String>,

    /// Free-form annotations (human-readable names, descriptions)
    #[serde(default, alias = "meta", skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStatus {
    /// Decision state ("Pending", "Approved", ...)
    #[serde(default)]
    #[schemars(with = "String", extend("default" = "Pending"))]
    pub state: ApprovalState,

    /// Resource created from the approved specification
    #[serde(default, alias = "active", skip_serializing_if = "Option::is_none")]
    pub materialized_resource_ref: Option<ResourceReference>,

    /// When the approval was acted upon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_time: Option<DateTime<Utc>>,

    /// Detailed status observations, keyed by type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ApprovalCondition>,
}

impl ApprovalStatus {
    /// Insert or update a condition in place. Returns whether anything changed.
    pub fn set_condition(&mut self, condition: ApprovalCondition) -> bool {
        set_condition(&mut self.conditions, condition)
    }
}

/// Approval decision state
///
/// Stored as a plain string so states written by other actors (e.g. a
/// "Rejected" or site-specific state) survive a read/write cycle unchanged.
/// The empty string means the record has never been initialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "String", into = "String")]
pub enum ApprovalState {
    /// No state recorded yet
    #[default]
    Unset,

    /// Waiting for a decision
    Pending,

    /// Approved; the resource should exist
    Approved,

    /// Rejected by an approver
    Rejected,

    /// Any other state, preserved verbatim
    Other(String),
}

impl ApprovalState {
    /// Wire representation of the state
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unset => "",
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Other(s) => s,
        }
    }

    /// True if no state has been recorded yet
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl From<String> for ApprovalState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => Self::Unset,
            "Pending" => Self::Pending,
            "Approved" => Self::Approved,
            "Rejected" => Self::Rejected,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ApprovalState {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ApprovalState> for String {
    fn from(state: ApprovalState) -> Self {
        match state {
            ApprovalState::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Approval {
    /// Current decision state (unset when there is no status yet)
    pub fn state(&self) -> ApprovalState {
        self.status
            .as_ref()
            .map(|s| s.state.clone())
            .unwrap_or_default()
    }

    /// Reference to the created resource, if any
    pub fn materialized_resource(&self) -> Option<&ResourceReference> {
        self.status
            .as_ref()
            .and_then(|s| s.materialized_resource_ref.as_ref())
    }

    /// True if the record is approved and the resource has not been created yet
    pub fn awaiting_materialization(&self) -> bool {
        self.state() == ApprovalState::Approved && self.materialized_resource().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_state_round_trip_preserves_unknown_values() {
        for raw in ["Pending", "Approved", "Rejected", "Escalated"] {
            let state = ApprovalState::from(raw);
            assert_eq!(String::from(state), raw);
        }
        assert_eq!(ApprovalState::from("Escalated"), ApprovalState::Other("Escalated".to_string()));
    }

    #[test]
    fn test_state_is_case_sensitive() {
        assert_eq!(ApprovalState::from("approved"), ApprovalState::Other("approved".to_string()));
    }

    #[test]
    fn test_empty_status_deserializes_as_unset() {
        let status: ApprovalStatus = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(status.state.is_unset());
        assert!(status.materialized_resource_ref.is_none());
        assert!(status.decision_time.is_none());
        assert!(status.conditions.is_empty());
    }

    #[test]
    fn test_legacy_field_names_are_accepted() {
        let approval: Approval = serde_json::from_value(serde_json::json!({
            "apiVersion": "acp.ag.ch/v1",
            "kind": "Approval",
            "metadata": {"name": "deploy-web", "namespace": "team-a"},
            "spec": {
                "resourceSpec": {"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cm"}},
                "roles": ["platform-admin"],
                "meta": {"ticket": "OPS-12"}
            },
            "status": {
                "state": "Approved",
                "active": {"apiVersion": "v1", "kind": "ConfigMap", "name": "cm", "namespace": "team-a"}
            }
        }))
        .unwrap();

        assert_eq!(approval.spec.authorized_roles, vec!["platform-admin"]);
        assert_eq!(approval.spec.metadata.get("ticket").map(String::as_str), Some("OPS-12"));
        assert_eq!(approval.state(), ApprovalState::Approved);
        assert_eq!(approval.materialized_resource().map(|r| r.name.as_str()), Some("cm"));
        assert!(!approval.awaiting_materialization());
    }

    #[test]
    fn test_status_serializes_current_field_names() {
        let status = ApprovalStatus {
            state: ApprovalState::Approved,
            materialized_resource_ref: Some(ResourceReference::with_namespace("v1", "ConfigMap", "cm", "team-a")),
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "Approved");
        assert_eq!(json["materializedResourceRef"]["namespace"], "team-a");
        assert!(json.get("decisionTime").is_none());
    }

    #[test]
    fn test_crd_schema_preserves_resource_specification() {
        let crd = serde_json::to_value(Approval::crd()).unwrap();
        assert_eq!(crd["metadata"]["name"], "approvals.acp.ag.ch");
        assert_eq!(crd["spec"]["names"]["shortNames"][0], "apv");

        let spec_props = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"]["properties"];
        assert_eq!(spec_props["resourceSpecification"]["x-kubernetes-preserve-unknown-fields"], true);
        assert_eq!(spec_props["authorizedRoles"]["minItems"], 1);
    }

    #[test]
    fn test_crd_schema_defaults_state_to_pending() {
        let crd = serde_json::to_value(Approval::crd()).unwrap();
        let status_props =
            &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["status"]["properties"];
        assert_eq!(status_props["state"]["type"], "string");
        assert_eq!(status_props["state"]["default"], "Pending");
    }
}
