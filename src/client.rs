//! Garden and seed cluster access
//!
//! The reconciler talks to two API servers: the garden cluster holding the
//! `Shoot` objects, and the seed cluster hosting each shoot's control plane.
//! Both are reached through traits so the flows can be tested with mocks.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, ResourceExt};

#[cfg(test)]
use mockall::automock;

use crate::crd::Shoot;
use crate::{Error, Result, FIELD_MANAGER};

/// Access to Shoot objects in the garden cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GardenClient: Send + Sync {
    /// Fetch the shoot `namespace/name`
    async fn get_shoot(&self, namespace: &str, name: &str) -> Result<Shoot>;

    /// Set `spec.networking.nodes` of the shoot with a merge patch
    async fn patch_shoot_nodes_cidr(&self, namespace: &str, name: &str, cidr: &str)
        -> Result<()>;
}

/// Access to auxiliary objects in the seed cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SeedClient: Send + Sync {
    /// Fetch a Secret, or `None` if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Fetch a ConfigMap, or `None` if it does not exist
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;

    /// Fetch a Service
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service>;

    /// Replace a Service with `service`
    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<()>;
}

/// Real garden client implementation
pub struct GardenClientImpl {
    client: Client,
}

impl GardenClientImpl {
    /// Create a new GardenClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GardenClient for GardenClientImpl {
    async fn get_shoot(&self, namespace: &str, name: &str) -> Result<Shoot> {
        let api: Api<Shoot> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn patch_shoot_nodes_cidr(
        &self,
        namespace: &str,
        name: &str,
        cidr: &str,
    ) -> Result<()> {
        let api: Api<Shoot> = Api::namespaced(self.client.clone(), namespace);

        let patch = serde_json::json!({
            "spec": {
                "networking": {
                    "nodes": cidr
                }
            }
        });

        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;

        Ok(())
    }
}

/// Real seed client implementation
pub struct SeedClientImpl {
    client: Client,
}

impl SeedClientImpl {
    /// Create a new SeedClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SeedClient for SeedClientImpl {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.replace(&service.name_any(), &params, service).await?;
        Ok(())
    }
}

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path
///
/// Without a path the configuration is inferred (in-cluster or `$KUBECONFIG`).
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::config(format!(
                    "failed to read kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::config(format!("failed to load kubeconfig: {}", e)))?
        }
        None => Config::infer()
            .await
            .map_err(|e| Error::config(format!("failed to infer config: {}", e)))?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);

    Client::try_from(config).map_err(|e| Error::config(format!("failed to create client: {}", e)))
}
