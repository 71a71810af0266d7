//! Shoot Custom Resource Definition
//!
//! A Shoot is the owner of an Infrastructure resource. Only the fields the
//! reconciler reads or writes are modelled; unknown fields are ignored on
//! read and never written back (writes to a Shoot are merge patches).

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{LastOperation, LastOperationType};
use crate::{ANNOTATION_SHOOT_TASKS, SEED_NAMESPACE_PREFIX};

/// Specification for a Shoot cluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "core.gardener.cloud",
    version = "v1beta1",
    kind = "Shoot",
    plural = "shoots",
    status = "ShootStatus",
    namespaced,
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.provider.type"}"#,
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.region"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ShootSpec {
    /// Cloud provider configuration
    #[serde(default)]
    pub provider: ShootProvider,

    /// Region the shoot runs in
    #[serde(default)]
    pub region: String,

    /// Network configuration
    #[serde(default)]
    pub networking: Networking,

    /// Hibernation configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hibernation: Option<Hibernation>,

    /// Source ranges allowed to reach the API server load balancer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub load_balancer_source_ranges: Vec<String>,
}

/// Provider section of a Shoot spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShootProvider {
    /// Provider type (e.g., "aws")
    #[serde(rename = "type", default)]
    pub type_: String,

    /// Opaque provider-specific infrastructure configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "super::types::preserve_unknown_fields")]
    pub infrastructure_config: Option<serde_json::Value>,
}

/// Network configuration of a Shoot
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    /// Network plugin type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// CIDR of the node network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<String>,

    /// CIDR of the pod network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<String>,

    /// CIDR of the service network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<String>,
}

/// Hibernation configuration of a Shoot
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Hibernation {
    /// Whether the shoot should be hibernated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Status for a Shoot
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShootStatus {
    /// Whether the shoot is currently hibernated
    #[serde(default)]
    pub is_hibernated: bool,

    /// Last operation performed on the shoot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,

    /// Name of the shoot's namespace in the seed cluster
    #[serde(rename = "technicalID", default, skip_serializing_if = "Option::is_none")]
    pub technical_id: Option<String>,
}

impl Shoot {
    /// Provider type of the shoot
    pub fn provider_type(&self) -> &str {
        &self.spec.provider.type_
    }

    /// Returns true if hibernation is requested in the spec
    pub fn hibernation_enabled(&self) -> bool {
        self.spec
            .hibernation
            .as_ref()
            .and_then(|h| h.enabled)
            .unwrap_or(false)
    }

    /// Returns true if the shoot is still in its initial creation
    pub fn in_creation_phase(&self) -> bool {
        self.last_operation_type() == Some(&LastOperationType::Create)
    }

    /// Returns true if the shoot is leaving hibernation
    ///
    /// Hibernation is no longer requested but the status still reports the
    /// shoot as hibernated.
    pub fn is_waking_up(&self) -> bool {
        !self.hibernation_enabled() && self.status.as_ref().is_some_and(|s| s.is_hibernated)
    }

    /// Returns true if the shoot is being deleted
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
            || self.last_operation_type() == Some(&LastOperationType::Delete)
    }

    /// Returns true if the comma-separated task annotation contains `task`
    pub fn has_task(&self, task: &str) -> bool {
        self.annotations()
            .get(ANNOTATION_SHOOT_TASKS)
            .is_some_and(|tasks| tasks.split(',').any(|t| t.trim() == task))
    }

    /// Namespace of this shoot in the seed cluster
    ///
    /// Uses `status.technicalID` when present, otherwise derives
    /// `shoot--<project>--<name>` from the `garden-<project>` namespace.
    pub fn seed_namespace(&self) -> Result<String, crate::Error> {
        if let Some(id) = self.status.as_ref().and_then(|s| s.technical_id.as_ref()) {
            if !id.is_empty() {
                return Ok(id.clone());
            }
        }

        let namespace = self
            .namespace()
            .ok_or_else(|| crate::Error::validation("shoot has no namespace"))?;
        let project = namespace.strip_prefix("garden-").unwrap_or(&namespace);
        Ok(format!(
            "{}{}--{}",
            SEED_NAMESPACE_PREFIX,
            project,
            self.name_any()
        ))
    }

    fn last_operation_type(&self) -> Option<&LastOperationType> {
        self.status
            .as_ref()
            .and_then(|s| s.last_operation.as_ref())
            .map(|op| &op.type_)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::types::LastOperationState;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    fn sample_shoot() -> Shoot {
        Shoot {
            metadata: ObjectMeta {
                name: Some("crazy-botany".to_string()),
                namespace: Some("garden-dev".to_string()),
                ..Default::default()
            },
            spec: ShootSpec {
                provider: ShootProvider {
                    type_: "aws".to_string(),
                    infrastructure_config: None,
                },
                region: "eu-west-1".to_string(),
                ..Default::default()
            },
            status: None,
        }
    }

    fn with_last_operation(mut shoot: Shoot, type_: LastOperationType) -> Shoot {
        shoot.status = Some(ShootStatus {
            last_operation: Some(LastOperation::new(type_, LastOperationState::Processing)),
            ..Default::default()
        });
        shoot
    }

    #[test]
    fn seed_namespace_prefers_technical_id() {
        let mut shoot = sample_shoot();
        shoot.status = Some(ShootStatus {
            technical_id: Some("shoot--other--id".to_string()),
            ..Default::default()
        });
        assert_eq!(shoot.seed_namespace().unwrap(), "shoot--other--id");
    }

    #[test]
    fn seed_namespace_derived_from_project_namespace() {
        let shoot = sample_shoot();
        assert_eq!(shoot.seed_namespace().unwrap(), "shoot--dev--crazy-botany");

        let mut shoot = sample_shoot();
        shoot.metadata.namespace = Some("garden".to_string());
        assert_eq!(shoot.seed_namespace().unwrap(), "shoot--garden--crazy-botany");
    }

    #[test]
    fn seed_namespace_requires_namespace() {
        let mut shoot = sample_shoot();
        shoot.metadata.namespace = None;
        assert!(shoot.seed_namespace().is_err());
    }

    #[test]
    fn creation_phase_follows_last_operation() {
        assert!(!sample_shoot().in_creation_phase());
        assert!(with_last_operation(sample_shoot(), LastOperationType::Create).in_creation_phase());
        assert!(
            !with_last_operation(sample_shoot(), LastOperationType::Reconcile).in_creation_phase()
        );
    }

    #[test]
    fn waking_up_requires_hibernated_status_without_hibernation() {
        let mut shoot = sample_shoot();
        shoot.status = Some(ShootStatus {
            is_hibernated: true,
            ..Default::default()
        });
        assert!(shoot.is_waking_up());

        shoot.spec.hibernation = Some(Hibernation {
            enabled: Some(true),
        });
        assert!(!shoot.is_waking_up());

        assert!(!sample_shoot().is_waking_up());
    }

    #[test]
    fn task_annotation_is_comma_separated() {
        let mut shoot = sample_shoot();
        shoot.metadata.annotations = Some(
            [(
                ANNOTATION_SHOOT_TASKS.to_string(),
                "deployDNSRecord, deployInfrastructure".to_string(),
            )]
            .into(),
        );
        assert!(shoot.has_task("deployInfrastructure"));
        assert!(!shoot.has_task("deployKubeAPIServer"));
        assert!(!sample_shoot().has_task("deployInfrastructure"));
    }

    #[test]
    fn deletion_detected_from_timestamp_or_operation() {
        assert!(!sample_shoot().is_being_deleted());
        assert!(with_last_operation(sample_shoot(), LastOperationType::Delete).is_being_deleted());

        let mut shoot = sample_shoot();
        shoot.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        assert!(shoot.is_being_deleted());
    }

    #[test]
    fn unknown_fields_are_ignored_on_read() {
        let shoot: Shoot = serde_json::from_value(serde_json::json!({
            "apiVersion": "core.gardener.cloud/v1beta1",
            "kind": "Shoot",
            "metadata": {"name": "a", "namespace": "garden-dev"},
            "spec": {
                "provider": {"type": "aws", "workers": [{"name": "w"}]},
                "region": "eu-west-1",
                "kubernetes": {"version": "1.30.0"},
                "networking": {"nodes": "10.250.0.0/16"},
                "loadBalancerSourceRanges": ["10.0.0.0/8"]
            },
            "status": {"isHibernated": false, "technicalID": "shoot--dev--a"}
        }))
        .unwrap();

        assert_eq!(shoot.provider_type(), "aws");
        assert_eq!(shoot.spec.networking.nodes.as_deref(), Some("10.250.0.0/16"));
        assert_eq!(shoot.spec.load_balancer_source_ranges, vec!["10.0.0.0/8"]);
    }
}
