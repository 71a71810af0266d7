//! Infrastructure extension resource
//!
//! An Infrastructure object lives in the seed namespace of a shoot. This crate
//! writes its spec; an out-of-process extension controller provisions the
//! cloud infrastructure and reports back through the status.

use k8s_openapi::ByteString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{LastError, LastOperation, SecretReference};

/// Desired state of the provider infrastructure
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Infrastructure",
    plural = "infrastructures",
    shortname = "infra",
    status = "InfrastructureStatus",
    namespaced,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.region"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.lastOperation.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    /// Provider type handled by the extension (e.g., "aws")
    #[serde(rename = "type", default)]
    pub type_: String,

    /// Opaque provider-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "super::types::preserve_unknown_fields")]
    pub provider_config: Option<serde_json::Value>,

    /// Region the infrastructure is created in
    #[serde(default)]
    pub region: String,

    /// Secret holding the cloud provider credentials
    #[serde(default)]
    pub secret_ref: SecretReference,

    /// Public SSH key installed on the machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub ssh_public_key: Option<ByteString>,
}

/// Observed state of the provider infrastructure, written by the extension
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// Generation most recently acted on by the extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last operation performed by the extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,

    /// Last error reported by the extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,

    /// Opaque provider-specific status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "super::types::preserve_unknown_fields")]
    pub provider_status: Option<serde_json::Value>,

    /// CIDR of the node network chosen by the extension
    #[serde(rename = "nodesCIDR", default, skip_serializing_if = "Option::is_none")]
    pub nodes_cidr: Option<String>,
}

impl Infrastructure {
    /// Provider status, if the extension has published one
    pub fn provider_status(&self) -> Option<&serde_json::Value> {
        self.status.as_ref().and_then(|s| s.provider_status.as_ref())
    }

    /// Nodes CIDR, if the extension has published one
    pub fn nodes_cidr(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.nodes_cidr.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn status_uses_upstream_field_names() {
        let status: InfrastructureStatus = serde_json::from_value(serde_json::json!({
            "observedGeneration": 3,
            "providerStatus": {"vpc": {"natIps": ["1.2.3.4"]}},
            "nodesCIDR": "10.250.0.0/16"
        }))
        .unwrap();

        assert_eq!(status.observed_generation, Some(3));
        assert_eq!(status.nodes_cidr.as_deref(), Some("10.250.0.0/16"));
        assert_eq!(
            status.provider_status.unwrap()["vpc"]["natIps"][0],
            "1.2.3.4"
        );
    }

    #[test]
    fn spec_serializes_ssh_key_as_base64() {
        let spec = InfrastructureSpec {
            type_: "aws".to_string(),
            region: "eu-west-1".to_string(),
            ssh_public_key: Some(ByteString(b"ssh-rsa AAAA".to_vec())),
            ..Default::default()
        };
        let json = serde_json::to_value(&spec).unwrap();

        assert_eq!(json["type"], "aws");
        assert_eq!(json["sshPublicKey"], "c3NoLXJzYSBBQUFB");
        assert!(json.get("providerConfig").is_none());
    }

    #[test]
    fn crd_is_namespaced_extension_resource() {
        let crd = Infrastructure::crd();
        assert_eq!(crd.spec.group, "extensions.gardener.cloud");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.kind, "Infrastructure");
    }
}
