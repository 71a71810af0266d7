//! Provider status projection
//!
//! The extension controller publishes an opaque, provider-specific status.
//! It is cached on the [`ShootState`] after every ready observation and
//! decoded on demand by provider type.

use serde::Deserialize;
use tracing::{debug, info};

use super::ShootState;
use crate::client::GardenClient;
use crate::crd::Infrastructure;
use crate::{Error, Result, PROVIDER_AWS};

/// Decoded provider status, keyed by provider type
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderStatus {
    /// Status published by the AWS extension
    Aws(AwsInfrastructureStatus),
    /// Status of a provider this crate does not interpret
    Unrecognized {
        /// Provider type of the shoot
        provider_type: String,
    },
}

/// Infrastructure status of the AWS extension
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AwsInfrastructureStatus {
    /// VPC section
    #[serde(default)]
    pub vpc: Option<AwsVpcStatus>,
}

/// VPC section of [`AwsInfrastructureStatus`]
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsVpcStatus {
    /// Public IPs of the NAT gateways used by the worker nodes
    #[serde(default)]
    pub nat_ips: Option<Vec<String>>,
}

impl ProviderStatus {
    /// Decode `raw` as the status of `provider_type`
    ///
    /// Unrecognized provider types never fail; malformed JSON for a
    /// recognized one is a serialization error.
    pub fn decode(provider_type: &str, raw: &serde_json::Value) -> Result<Self> {
        match provider_type {
            PROVIDER_AWS => {
                let status = AwsInfrastructureStatus::deserialize(raw).map_err(|e| {
                    Error::serialization(format!("invalid aws infrastructure status: {e}"))
                })?;
                Ok(Self::Aws(status))
            }
            other => Ok(Self::Unrecognized {
                provider_type: other.to_string(),
            }),
        }
    }

    /// NAT IPs of the worker nodes, empty when none are published
    pub fn nat_ips(&self) -> Vec<String> {
        match self {
            Self::Aws(status) => {
                match status.vpc.as_ref().and_then(|vpc| vpc.nat_ips.as_ref()) {
                    Some(ips) => ips.clone(),
                    None => {
                        info!(
                            "no NAT IPs in infrastructure status, infrastructure may be reconciled by a legacy extension controller"
                        );
                        Vec::new()
                    }
                }
            }
            Self::Unrecognized { .. } => Vec::new(),
        }
    }
}

/// Copy the status of a ready Infrastructure into the shoot
///
/// The provider status is cached on every call. A published nodes CIDR is
/// written to the shoot only while the shoot has none.
pub async fn project_status(
    infra: &Infrastructure,
    state: &mut ShootState,
    garden: &dyn GardenClient,
) -> Result<()> {
    state.infrastructure_status = infra.provider_status().cloned();

    let Some(cidr) = infra.nodes_cidr() else {
        return Ok(());
    };
    if state.shoot.spec.networking.nodes.is_some() {
        debug!(nodes = %cidr, "shoot already has a nodes CIDR");
        return Ok(());
    }

    let (namespace, name) = state.shoot_key();
    garden
        .patch_shoot_nodes_cidr(&namespace, &name, cidr)
        .await?;
    info!(shoot = %name, nodes = %cidr, "persisted nodes CIDR into shoot");
    state.shoot.spec.networking.nodes = Some(cidr.to_string());
    Ok(())
}

/// Public IPs of the shoot's worker nodes
///
/// Only AWS publishes them; other providers yield an empty list.
pub fn worker_public_ips(state: &ShootState) -> Result<Vec<String>> {
    let provider_type = state.shoot.provider_type();
    if provider_type != PROVIDER_AWS {
        return Ok(Vec::new());
    }

    let raw = state
        .infrastructure_status
        .as_ref()
        .ok_or_else(|| Error::serialization("cannot find infrastructure provider status"))?;
    Ok(ProviderStatus::decode(provider_type, raw)?.nat_ips())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockGardenClient;
    use crate::crd::InfrastructureStatus;
    use crate::infrastructure::tests::{sample_shoot, sample_state};
    use mockall::predicate::eq;
    use serde_json::json;

    fn ready_infra(status: InfrastructureStatus) -> Infrastructure {
        let mut infra = Infrastructure::new("crazy-botany", Default::default());
        infra.status = Some(status);
        infra
    }

    mod decode {
        use super::*;

        #[test]
        fn aws_nat_ips_are_extracted() {
            let status =
                ProviderStatus::decode("aws", &json!({"vpc": {"natIps": ["1.2.3.4"]}})).unwrap();
            assert_eq!(status.nat_ips(), vec!["1.2.3.4"]);
        }

        #[test]
        fn missing_nat_ips_yield_empty_list() {
            let status = ProviderStatus::decode("aws", &json!({"vpc": {}})).unwrap();
            assert!(status.nat_ips().is_empty());

            let status = ProviderStatus::decode("aws", &json!({})).unwrap();
            assert!(status.nat_ips().is_empty());
        }

        #[test]
        fn malformed_aws_status_is_a_serialization_error() {
            let err = ProviderStatus::decode("aws", &json!({"vpc": {"natIps": "1.2.3.4"}}))
                .unwrap_err();
            assert!(matches!(err, Error::Serialization(_)));
        }

        #[test]
        fn unrecognized_provider_never_fails() {
            let status = ProviderStatus::decode("openstack", &json!("garbage")).unwrap();
            assert_eq!(
                status,
                ProviderStatus::Unrecognized {
                    provider_type: "openstack".to_string()
                }
            );
            assert!(status.nat_ips().is_empty());
        }
    }

    mod projection {
        use super::*;

        #[tokio::test]
        async fn provider_status_is_cached_and_cidr_persisted_once() {
            let mut garden = MockGardenClient::new();
            garden
                .expect_patch_shoot_nodes_cidr()
                .with(eq("garden-dev"), eq("crazy-botany"), eq("10.250.0.0/16"))
                .times(1)
                .returning(|_, _, _| Ok(()));

            let infra = ready_infra(InfrastructureStatus {
                provider_status: Some(json!({"vpc": {"natIps": ["1.2.3.4"]}})),
                nodes_cidr: Some("10.250.0.0/16".to_string()),
                ..Default::default()
            });
            let mut state = sample_state(sample_shoot());

            project_status(&infra, &mut state, &garden).await.unwrap();
            assert_eq!(
                state.shoot.spec.networking.nodes.as_deref(),
                Some("10.250.0.0/16")
            );
            assert!(state.infrastructure_status.is_some());

            // second projection must not patch again
            project_status(&infra, &mut state, &garden).await.unwrap();
        }

        #[tokio::test]
        async fn existing_nodes_cidr_is_never_overwritten() {
            let garden = MockGardenClient::new();
            let infra = ready_infra(InfrastructureStatus {
                nodes_cidr: Some("10.250.0.0/16".to_string()),
                ..Default::default()
            });
            let mut shoot = sample_shoot();
            shoot.spec.networking.nodes = Some("10.0.0.0/16".to_string());
            let mut state = sample_state(shoot);

            project_status(&infra, &mut state, &garden).await.unwrap();
            assert_eq!(state.shoot.spec.networking.nodes.as_deref(), Some("10.0.0.0/16"));
        }

        #[tokio::test]
        async fn patch_failure_propagates() {
            let mut garden = MockGardenClient::new();
            garden
                .expect_patch_shoot_nodes_cidr()
                .returning(|_, _, _| Err(Error::internal("garden unavailable")));
            let infra = ready_infra(InfrastructureStatus {
                nodes_cidr: Some("10.250.0.0/16".to_string()),
                ..Default::default()
            });
            let mut state = sample_state(sample_shoot());

            assert!(project_status(&infra, &mut state, &garden).await.is_err());
            assert!(state.shoot.spec.networking.nodes.is_none());
        }
    }

    mod worker_ips {
        use super::*;

        #[test]
        fn aws_without_status_is_an_error() {
            let state = sample_state(sample_shoot());
            assert!(matches!(
                worker_public_ips(&state),
                Err(Error::Serialization(_))
            ));
        }

        #[test]
        fn aws_status_yields_nat_ips() {
            let mut state = sample_state(sample_shoot());
            state.infrastructure_status = Some(json!({"vpc": {"natIps": ["1.2.3.4", "5.6.7.8"]}}));
            assert_eq!(
                worker_public_ips(&state).unwrap(),
                vec!["1.2.3.4", "5.6.7.8"]
            );
        }

        #[test]
        fn other_providers_have_no_worker_ips() {
            let mut shoot = sample_shoot();
            shoot.spec.provider.type_ = "gcp".to_string();
            let state = sample_state(shoot);
            assert!(worker_public_ips(&state).unwrap().is_empty());
        }
    }
}
