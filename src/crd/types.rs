//! Supporting types shared by the Infrastructure and Shoot CRDs

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Schema for opaque, provider-specific JSON payloads.
///
/// The API server must keep every field of these objects, so the schema is
/// an object with `x-kubernetes-preserve-unknown-fields` set.
pub fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}

/// Reference to a Secret by name and namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretReference {
    /// Secret name
    #[serde(default)]
    pub name: String,

    /// Secret namespace
    #[serde(default)]
    pub namespace: String,
}

/// Type of the last operation performed on a resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
pub enum LastOperationType {
    /// Resource is being created
    Create,
    /// Resource is being reconciled
    #[default]
    Reconcile,
    /// Resource is being deleted
    Delete,
    /// Resource is being migrated to another seed
    Migrate,
    /// Resource is being restored after a migration
    Restore,
}

impl std::fmt::Display for LastOperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "Create"),
            Self::Reconcile => write!(f, "Reconcile"),
            Self::Delete => write!(f, "Delete"),
            Self::Migrate => write!(f, "Migrate"),
            Self::Restore => write!(f, "Restore"),
        }
    }
}

/// State of the last operation performed on a resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
pub enum LastOperationState {
    /// Operation is queued
    #[default]
    Pending,
    /// Operation is running
    Processing,
    /// Operation finished successfully
    Succeeded,
    /// Operation failed but will be retried
    Error,
    /// Operation failed permanently
    Failed,
    /// Operation was aborted
    Aborted,
}

impl std::fmt::Display for LastOperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Processing => write!(f, "Processing"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Error => write!(f, "Error"),
            Self::Failed => write!(f, "Failed"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Last operation performed on a resource, written by whoever acted on it
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    /// Operation type
    #[serde(rename = "type")]
    pub type_: LastOperationType,

    /// Operation state
    pub state: LastOperationState,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Progress in percent
    #[serde(default)]
    pub progress: i32,

    /// RFC 3339 timestamp of the last update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
}

impl LastOperation {
    /// Create a last operation with the given type and state
    pub fn new(type_: LastOperationType, state: LastOperationState) -> Self {
        Self {
            type_,
            state,
            ..Default::default()
        }
    }

    /// Returns true if the operation finished successfully
    pub fn succeeded(&self) -> bool {
        self.state == LastOperationState::Succeeded
    }
}

/// Error reported by the extension actor
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    /// Human-readable description of the error
    pub description: String,

    /// Machine-readable error codes (e.g., ERR_INFRA_QUOTA_EXCEEDED)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<String>,

    /// RFC 3339 timestamp of the last update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
}

impl LastError {
    /// Create a last error with the given description
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_operation_round_trips_wire_names() {
        let op: LastOperation = serde_json::from_value(serde_json::json!({
            "type": "Create",
            "state": "Succeeded",
            "description": "done",
            "progress": 100,
            "lastUpdateTime": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(op.type_, LastOperationType::Create);
        assert!(op.succeeded());
        assert_eq!(op.last_update_time.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn last_error_codes_default_to_empty() {
        let err: LastError =
            serde_json::from_value(serde_json::json!({"description": "quota"})).unwrap();
        assert!(err.codes.is_empty());
        assert_eq!(err, LastError::new("quota"));
    }

    #[test]
    fn opaque_schema_preserves_unknown_fields() {
        let mut gen = SchemaGenerator::default();
        let schema = serde_json::to_value(preserve_unknown_fields(&mut gen)).unwrap();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["x-kubernetes-preserve-unknown-fields"], true);
    }
}
