//! Infrastructure flows for a Shoot
//!
//! The flows run in this order for a live shoot:
//!
//! 1. [`deploy_infrastructure`] writes the desired Infrastructure spec
//! 2. [`wait_until_infrastructure_ready`] waits for the extension and projects its status
//! 3. [`firewall::deploy_apiserver_firewall`] restricts the API server load balancer
//!
//! and for a shoot being deleted:
//!
//! 1. [`destroy_infrastructure`] confirms and deletes the Infrastructure
//! 2. [`wait_until_infrastructure_deleted`] waits until it is gone

pub mod firewall;
pub mod status;

use k8s_openapi::ByteString;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{GardenClient, SeedClient};
use crate::config::WaitOptions;
use crate::crd::{Infrastructure, InfrastructureSpec, SecretReference, Shoot};
use crate::extension::{
    create_or_update, delete_extension, wait_until_deleted, wait_until_ready, ApplyResult,
    ObjectStore,
};
use crate::{
    Error, Result, ANNOTATION_OPERATION, DATA_KEY_SSH_AUTHORIZED_KEYS, OPERATION_RECONCILE,
    SECRET_NAME_CLOUD_PROVIDER, SECRET_NAME_SSH_KEYPAIR, TASK_DEPLOY_INFRASTRUCTURE,
};

pub use firewall::{deploy_apiserver_firewall, synthesize_source_ranges};
pub use status::{project_status, worker_public_ips, AwsInfrastructureStatus, ProviderStatus};

/// In-memory view of a shoot during one reconciliation
#[derive(Clone, Debug)]
pub struct ShootState {
    /// The shoot as last read or written
    pub shoot: Shoot,
    /// Namespace of the shoot's control plane in the seed cluster
    pub seed_namespace: String,
    /// Public SSH key installed on the worker machines
    pub ssh_public_key: Option<Vec<u8>>,
    /// Provider status copied from the last ready Infrastructure
    pub infrastructure_status: Option<serde_json::Value>,
}

impl ShootState {
    /// Create the state of `shoot` without seed data
    pub fn new(shoot: Shoot) -> Result<Self> {
        let seed_namespace = shoot.seed_namespace()?;
        Ok(Self {
            shoot,
            seed_namespace,
            ssh_public_key: None,
            infrastructure_status: None,
        })
    }

    /// Create the state of `shoot`, reading its SSH key pair from the seed
    pub async fn load(shoot: Shoot, seed: &dyn SeedClient) -> Result<Self> {
        let mut state = Self::new(shoot)?;

        let secret = seed
            .get_secret(&state.seed_namespace, SECRET_NAME_SSH_KEYPAIR)
            .await?
            .ok_or_else(|| {
                Error::not_ready(
                    "Secret",
                    format!("{}/{}", state.seed_namespace, SECRET_NAME_SSH_KEYPAIR),
                    "secret does not exist yet",
                )
            })?;

        state.ssh_public_key = secret
            .data
            .and_then(|mut data| data.remove(DATA_KEY_SSH_AUTHORIZED_KEYS))
            .map(|key| key.0);
        if state.ssh_public_key.is_none() {
            warn!(
                namespace = %state.seed_namespace,
                "ssh key pair secret has no public key"
            );
        }

        Ok(state)
    }

    /// Name of the shoot's Infrastructure object
    pub fn infrastructure_name(&self) -> String {
        self.shoot.name_any()
    }

    /// Garden namespace and name of the shoot
    pub fn shoot_key(&self) -> (String, String) {
        (
            self.shoot.namespace().unwrap_or_default(),
            self.shoot.name_any(),
        )
    }
}

/// Build the desired Infrastructure spec from the shoot
pub fn build_infrastructure_spec(state: &ShootState) -> Result<InfrastructureSpec> {
    let shoot = &state.shoot;
    if shoot.provider_type().is_empty() {
        return Err(Error::validation(format!(
            "shoot {} has no provider type",
            shoot.name_any()
        )));
    }
    if shoot.spec.region.is_empty() {
        return Err(Error::validation(format!(
            "shoot {} has no region",
            shoot.name_any()
        )));
    }

    Ok(InfrastructureSpec {
        type_: shoot.provider_type().to_string(),
        provider_config: shoot.spec.provider.infrastructure_config.clone(),
        region: shoot.spec.region.clone(),
        secret_ref: SecretReference {
            name: SECRET_NAME_CLOUD_PROVIDER.to_string(),
            namespace: state.seed_namespace.clone(),
        },
        ssh_public_key: state.ssh_public_key.clone().map(ByteString),
    })
}

/// Returns true if the extension must be asked to reconcile
///
/// That is the case while the shoot is being created, while it wakes up
/// from hibernation, and when the `deployInfrastructure` task is requested.
pub fn requests_reconciliation(shoot: &Shoot) -> bool {
    shoot.in_creation_phase() || shoot.is_waking_up() || shoot.has_task(TASK_DEPLOY_INFRASTRUCTURE)
}

/// Create or update the shoot's Infrastructure
pub async fn deploy_infrastructure(
    store: &dyn ObjectStore<Infrastructure>,
    state: &ShootState,
) -> Result<Infrastructure> {
    let spec = build_infrastructure_spec(state)?;
    let reconcile = requests_reconciliation(&state.shoot);
    let name = state.infrastructure_name();

    let (infra, result) = create_or_update(
        store,
        &state.seed_namespace,
        &name,
        move |infra: &mut Infrastructure| {
            if reconcile {
                infra
                    .annotations_mut()
                    .insert(ANNOTATION_OPERATION.to_string(), OPERATION_RECONCILE.to_string());
            }
            infra.spec = spec;
            Ok(())
        },
    )
    .await?;

    info!(
        namespace = %state.seed_namespace,
        infrastructure = %name,
        created = result == ApplyResult::Created,
        reconcile,
        "deployed infrastructure"
    );
    Ok(infra)
}

/// Wait until the Infrastructure is ready and project its status
pub async fn wait_until_infrastructure_ready(
    store: &dyn ObjectStore<Infrastructure>,
    garden: &dyn GardenClient,
    state: &mut ShootState,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<Infrastructure> {
    let infra = wait_until_ready(
        store,
        &state.seed_namespace,
        &state.infrastructure_name(),
        options,
        cancel,
    )
    .await?;

    project_status(&infra, state, garden).await?;
    info!(namespace = %state.seed_namespace, "infrastructure is ready");
    Ok(infra)
}

/// Confirm and delete the shoot's Infrastructure
pub async fn destroy_infrastructure(
    store: &dyn ObjectStore<Infrastructure>,
    state: &ShootState,
) -> Result<()> {
    delete_extension(store, &state.seed_namespace, &state.infrastructure_name()).await
}

/// Wait until the shoot's Infrastructure is gone
pub async fn wait_until_infrastructure_deleted(
    store: &dyn ObjectStore<Infrastructure>,
    state: &ShootState,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    wait_until_deleted(
        store,
        &state.seed_namespace,
        &state.infrastructure_name(),
        options,
        cancel,
    )
    .await?;
    info!(namespace = %state.seed_namespace, "infrastructure is deleted");
    Ok(())
}
