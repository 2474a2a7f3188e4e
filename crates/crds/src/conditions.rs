//! Status conditions
//!
//! Conditions are an ordered list keyed by `type`: at most one entry exists per
//! type, and updating an existing type rewrites that entry in place so its
//! position in the list never moves.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type recording whether the approved resource has been created.
pub const CONDITION_MATERIALIZED: &str = "Materialized";

/// Reason: the creation call succeeded.
pub const REASON_RESOURCE_CREATED: &str = "ResourceCreated";

/// Reason: the resource already existed (a previous creation won the race).
pub const REASON_RESOURCE_ALREADY_EXISTS: &str = "ResourceAlreadyExists";

/// Reason: the embedded resource specification could not be decoded.
pub const REASON_INVALID_RESOURCE_SPECIFICATION: &str = "InvalidResourceSpecification";

/// Reason: materialization keeps failing for any other cause.
pub const REASON_MATERIALIZATION_FAILED: &str = "MaterializationFailed";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Tri-state condition status, serialized as "True", "False" or "Unknown".
pub enum ConditionStatus {
    /// Condition holds
    True,

    /// Condition does not hold
    False,

    /// Condition state cannot be determined
    #[default]
    Unknown,
}

/// A single observation of one aspect of an approval's state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalCondition {
    /// Condition type (unique within the list)
    #[serde(rename = "type")]
    pub type_: String,

    /// Condition status
    pub status: ConditionStatus,

    /// Machine-readable CamelCase reason for the last transition
    #[serde(default)]
    pub reason: String,

    /// Human-readable message with details
    #[serde(default)]
    pub message: String,

    /// Last time the condition's status changed
    pub last_transition_time: DateTime<Utc>,

    /// Object generation the condition was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ApprovalCondition {
    /// Create a condition stamped with the current time
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
            observed_generation: None,
        }
    }

    /// Attach the generation the condition was observed at
    #[must_use]
    pub fn observed_at(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }
}

/// Find the condition of the given type
pub fn find_condition<'a>(
    conditions: &'a [ApprovalCondition],
    type_: &str,
) -> Option<&'a ApprovalCondition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Insert or update a condition, returning whether anything changed.
///
/// An existing entry keeps its slot. Its `lastTransitionTime` only moves when
/// `status` changes; reason, message and observed generation are always taken
/// from `condition`.
pub fn set_condition(conditions: &mut Vec<ApprovalCondition>, condition: ApprovalCondition) -> bool {
    let Some(existing) = conditions.iter_mut().find(|c| c.type_ == condition.type_) else {
        conditions.push(condition);
        return true;
    };

    let mut changed = false;
    if existing.status != condition.status {
        existing.status = condition.status;
        existing.last_transition_time = condition.last_transition_time;
        changed = true;
    }
    if existing.reason != condition.reason {
        existing.reason = condition.reason;
        changed = true;
    }
    if existing.message != condition.message {
        existing.message = condition.message;
        changed = true;
    }
    if existing.observed_generation != condition.observed_generation {
        existing.observed_generation = condition.observed_generation;
        changed = true;
    }
    changed
}
