//! Raw resource specification decoder
//!
//! An `Approval` embeds the resource to create as an untyped document. This
//! module turns that document into an [`UnstructuredObject`]: a JSON object
//! with typed accessors for the few fields the controller relies on
//! (`apiVersion`, `kind`, `metadata.name`, `metadata.namespace`). Everything
//! else is carried through untouched.

use crds::ResourceReference;
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Errors produced while decoding a resource specification
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON
    #[error("malformed resource specification: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Payload is valid JSON but not an object
    #[error("resource specification must be an object, got {0}")]
    NotAnObject(&'static str),

    /// A required self-describing field is missing, empty or not a string
    #[error("resource specification is missing required field `{0}`")]
    MissingField(&'static str),

    /// `metadata` is present but not an object
    #[error("resource specification field `metadata` must be an object")]
    InvalidMetadata,
}

/// A dynamically-typed Kubernetes object.
#[derive(Debug, Clone, PartialEq)]
pub struct UnstructuredObject {
    object: Map<String, Value>,
}

impl UnstructuredObject {
    /// Decode a JSON byte payload.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(raw)?;
        Self::from_value(value)
    }

    /// Build from an already-parsed document, validating the identifying fields.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let object = match value {
            Value::Object(map) => map,
            other => return Err(DecodeError::NotAnObject(json_type_name(&other))),
        };

        let decoded = Self { object };
        decoded.validate()?;
        Ok(decoded)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        non_empty_str(self.object.get("apiVersion")).ok_or(DecodeError::MissingField("apiVersion"))?;
        non_empty_str(self.object.get("kind")).ok_or(DecodeError::MissingField("kind"))?;
        match self.object.get("metadata") {
            None | Some(Value::Null) => return Err(DecodeError::MissingField("metadata.name")),
            Some(Value::Object(meta)) => {
                non_empty_str(meta.get("name")).ok_or(DecodeError::MissingField("metadata.name"))?;
                match meta.get("namespace") {
                    None | Some(Value::Null | Value::String(_)) => {}
                    Some(_) => return Err(DecodeError::InvalidMetadata),
                }
            }
            Some(_) => return Err(DecodeError::InvalidMetadata),
        }
        Ok(())
    }

    /// `apiVersion`, e.g. "apps/v1" or "v1"
    pub fn api_version(&self) -> &str {
        self.object.get("apiVersion").and_then(Value::as_str).unwrap_or_default()
    }

    /// `kind`, e.g. "Deployment"
    pub fn kind(&self) -> &str {
        self.object.get("kind").and_then(Value::as_str).unwrap_or_default()
    }

    /// `metadata.name`
    pub fn name(&self) -> &str {
        self.metadata()
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// `metadata.namespace`, `None` when absent or empty
    pub fn namespace(&self) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty())
    }

    /// Set `metadata.namespace`
    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        let metadata = self
            .object
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(meta) = metadata {
            meta.insert("namespace".to_string(), Value::String(namespace.into()));
        }
    }

    /// Drop `metadata.namespace` (cluster-scoped kinds have none)
    pub fn clear_namespace(&mut self) {
        if let Some(Value::Object(meta)) = self.object.get_mut("metadata") {
            meta.remove("namespace");
        }
    }

    /// Group, version and kind split out of `apiVersion` and `kind`.
    ///
    /// Core resources ("v1") have an empty group.
    pub fn group_version_kind(&self) -> GroupVersionKind {
        let (group, version) = match self.api_version().split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", self.api_version()),
        };
        GroupVersionKind::gvk(group, version, self.kind())
    }

    /// Reference to this object, as recorded in an approval's status
    pub fn to_reference(&self) -> ResourceReference {
        ResourceReference {
            api_version: self.api_version().to_string(),
            kind: self.kind().to_string(),
            name: self.name().to_string(),
            namespace: self.namespace().map(str::to_string),
        }
    }

    /// Convert into a `DynamicObject` for the dynamic kube API.
    pub fn to_dynamic_object(&self) -> Result<DynamicObject, DecodeError> {
        Ok(serde_json::from_value(self.as_value())?)
    }

    /// The full document
    pub fn as_value(&self) -> Value {
        Value::Object(self.object.clone())
    }

    /// Consume into the full document
    pub fn into_value(self) -> Value {
        Value::Object(self.object)
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.object.get("metadata").and_then(Value::as_object)
    }
}

impl fmt::Display for UnstructuredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace() {
            Some(ns) => write!(f, "{}/{} {}/{}", self.api_version(), self.kind(), ns, self.name()),
            None => write!(f, "{}/{} {}", self.api_version(), self.kind(), self.name()),
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
