//! Shoot controller implementation
//!
//! This module implements the reconciliation logic for Shoot resources. A
//! live shoot gets its Infrastructure deployed, waited for and projected,
//! followed by the API server firewall. A shoot being deleted gets its
//! Infrastructure destroyed.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::client::{GardenClient, GardenClientImpl, SeedClient, SeedClientImpl};
use crate::config::ReconcilerConfig;
use crate::crd::{Infrastructure, Shoot};
use crate::extension::{KubeStore, ObjectStore};
use crate::infrastructure::{
    deploy_apiserver_firewall, deploy_infrastructure, destroy_infrastructure,
    wait_until_infrastructure_deleted, wait_until_infrastructure_ready, ShootState,
};
use crate::Error;

/// Requeue delay after a retryable failure
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Requeue delay after a failure that needs outside intervention
const PERMANENT_FAILURE_DELAY: Duration = Duration::from_secs(60);

/// Controller context containing shared state and clients
///
/// Use [`Context::builder`] to construct instances:
///
/// ```ignore
/// let ctx = Context::builder(garden_client, seed_client)
///     .config(config)
///     .cancel(token)
///     .build();
/// ```
pub struct Context {
    /// Garden cluster access (trait object for testability)
    pub garden: Arc<dyn GardenClient>,
    /// Seed cluster access for secrets, ConfigMaps and Services
    pub seed: Arc<dyn SeedClient>,
    /// Infrastructure objects in the seed cluster
    pub infrastructures: Arc<dyn ObjectStore<Infrastructure>>,
    /// Reconciler configuration
    pub config: ReconcilerConfig,
    /// Cancels in-flight waits on shutdown
    pub cancel: CancellationToken,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(garden: Client, seed: Client) -> ContextBuilder {
        ContextBuilder::new(garden, seed)
    }

    /// Create a context for testing with custom mock clients
    ///
    /// This method is primarily for unit tests where a real Kubernetes
    /// client is not available. For production code, use [`Context::builder`].
    #[cfg(test)]
    pub fn for_testing(
        garden: Arc<dyn GardenClient>,
        seed: Arc<dyn SeedClient>,
        infrastructures: Arc<dyn ObjectStore<Infrastructure>>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            garden,
            seed,
            infrastructures,
            config,
            cancel: CancellationToken::new(),
        }
    }
}

/// Builder for constructing [`Context`] instances
pub struct ContextBuilder {
    garden_client: Client,
    seed_client: Client,
    garden: Option<Arc<dyn GardenClient>>,
    seed: Option<Arc<dyn SeedClient>>,
    infrastructures: Option<Arc<dyn ObjectStore<Infrastructure>>>,
    config: ReconcilerConfig,
    cancel: CancellationToken,
}

impl ContextBuilder {
    fn new(garden_client: Client, seed_client: Client) -> Self {
        Self {
            garden_client,
            seed_client,
            garden: None,
            seed: None,
            infrastructures: None,
            config: ReconcilerConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the reconciler configuration
    pub fn config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the token that cancels in-flight waits
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Override the garden client (primarily for testing)
    pub fn garden_client(mut self, garden: Arc<dyn GardenClient>) -> Self {
        self.garden = Some(garden);
        self
    }

    /// Override the seed client (primarily for testing)
    pub fn seed_client(mut self, seed: Arc<dyn SeedClient>) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Override the Infrastructure store (primarily for testing)
    pub fn infrastructure_store(mut self, store: Arc<dyn ObjectStore<Infrastructure>>) -> Self {
        self.infrastructures = Some(store);
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        Context {
            garden: self
                .garden
                .unwrap_or_else(|| Arc::new(GardenClientImpl::new(self.garden_client.clone()))),
            seed: self
                .seed
                .unwrap_or_else(|| Arc::new(SeedClientImpl::new(self.seed_client.clone()))),
            infrastructures: self
                .infrastructures
                .unwrap_or_else(|| Arc::new(KubeStore::new(self.seed_client.clone()))),
            config: self.config,
            cancel: self.cancel,
        }
    }
}

/// Deploy a shoot's Infrastructure, wait for it and open its firewall
///
/// Returns the load balancer source ranges written to the API server Service.
pub async fn deploy_shoot(shoot: &Shoot, ctx: &Context) -> Result<Vec<String>, Error> {
    let mut state = ShootState::load(shoot.clone(), ctx.seed.as_ref()).await?;
    let store = ctx.infrastructures.as_ref();

    deploy_infrastructure(store, &state).await?;
    wait_until_infrastructure_ready(
        store,
        ctx.garden.as_ref(),
        &mut state,
        ctx.config.infrastructure_wait(),
        &ctx.cancel,
    )
    .await?;

    deploy_apiserver_firewall(ctx.seed.as_ref(), &state, &ctx.config.firewall).await
}

/// Delete a shoot's Infrastructure and wait until it is gone
pub async fn destroy_shoot(shoot: &Shoot, ctx: &Context) -> Result<(), Error> {
    let state = ShootState::new(shoot.clone())?;
    let store = ctx.infrastructures.as_ref();

    destroy_infrastructure(store, &state).await?;
    wait_until_infrastructure_deleted(
        store,
        &state,
        ctx.config.infrastructure_wait(),
        &ctx.cancel,
    )
    .await
}

/// Reconcile a Shoot resource
///
/// # Returns
///
/// Returns an `Action` indicating when to requeue the resource, or an error
/// if reconciliation failed.
#[instrument(skip(shoot, ctx), fields(shoot = %shoot.name_any()))]
pub async fn reconcile(shoot: Arc<Shoot>, ctx: Arc<Context>) -> Result<Action, Error> {
    if shoot.is_being_deleted() {
        info!("shoot is being deleted, destroying infrastructure");
        destroy_shoot(&shoot, &ctx).await?;
        info!("infrastructure destroyed");
        return Ok(Action::await_change());
    }

    info!("reconciling shoot infrastructure");
    match deploy_shoot(&shoot, &ctx).await {
        Ok(ranges) => {
            info!(source_ranges = ranges.len(), "shoot infrastructure reconciled");
            Ok(Action::requeue(ctx.config.resync_period()))
        }
        Err(Error::Validation(msg)) => {
            // Only a spec change can fix these
            warn!(error = %msg, "shoot validation failed");
            Ok(Action::await_change())
        }
        Err(e) => Err(e),
    }
}

/// Error policy for the Shoot controller
///
/// Retryable errors are requeued quickly, others after a longer pause. A
/// canceled wait is not retried until the shoot changes again.
pub fn error_policy(shoot: Arc<Shoot>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        shoot = %shoot.name_any(),
        "reconciliation failed"
    );

    match error {
        Error::Canceled { .. } => Action::await_change(),
        e if e.is_retryable() => Action::requeue(RETRY_DELAY),
        _ => Action::requeue(PERMANENT_FAILURE_DELAY),
    }
}
