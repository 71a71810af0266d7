//! infra-reconciler - Infrastructure extension reconciler for Shoot clusters

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use infra_reconciler::client::{create_client, GardenClient};
use infra_reconciler::config::ReconcilerConfig;
use infra_reconciler::controller::{deploy_shoot, destroy_shoot, error_policy, reconcile, Context};
use infra_reconciler::crd::{Infrastructure, Shoot};

/// infra-reconciler - drives Infrastructure extension resources for Shoot clusters
#[derive(Parser, Debug)]
#[command(name = "infra-reconciler", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Kubeconfig of the garden cluster holding the Shoots (inferred if unset)
    #[arg(long, env = "GARDEN_KUBECONFIG", global = true)]
    garden_kubeconfig: Option<PathBuf>,

    /// Kubeconfig of the seed cluster hosting the control planes (inferred if unset)
    #[arg(long, env = "SEED_KUBECONFIG", global = true)]
    seed_kubeconfig: Option<PathBuf>,

    /// Path to the reconciler configuration file
    #[arg(short = 'c', long = "config", env = "INFRA_RECONCILER_CONFIG", global = true)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches Shoots in the garden cluster and reconciles their
    /// Infrastructure in the seed cluster.
    Controller,

    /// Deploy a single shoot's Infrastructure, wait for it and open its firewall
    Deploy(ShootArgs),

    /// Delete a single shoot's Infrastructure and wait until it is gone
    Destroy(ShootArgs),

    /// Print the configured override values of a component as JSON
    Values {
        /// Component name (e.g., etcd)
        component: String,
    },
}

/// Identifies a shoot in the garden cluster
#[derive(Args, Debug)]
struct ShootArgs {
    /// Garden namespace of the shoot (e.g., garden-dev)
    #[arg(short = 'n', long)]
    namespace: String,

    /// Name of the shoot
    name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        for crd in [Infrastructure::crd(), Shoot::crd()] {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    let config = match &cli.config_file {
        Some(path) => ReconcilerConfig::load(path)?,
        None => ReconcilerConfig::default(),
    };

    let clusters = kubeconfigs(&cli);
    match cli.command {
        Some(Commands::Values { component }) => {
            let values = config.value_overrides.values_for(&component);
            println!("{}", serde_json::to_string_pretty(&values)?);
            Ok(())
        }
        Some(Commands::Deploy(args)) => run_deploy(&clusters, config, args).await,
        Some(Commands::Destroy(args)) => run_destroy(&clusters, config, args).await,
        Some(Commands::Controller) | None => run_controller(&clusters, config).await,
    }
}

/// Kubeconfig paths of the garden and seed clusters
struct Kubeconfigs {
    garden: Option<PathBuf>,
    seed: Option<PathBuf>,
}

fn kubeconfigs(cli: &Cli) -> Kubeconfigs {
    Kubeconfigs {
        garden: cli.garden_kubeconfig.clone(),
        seed: cli.seed_kubeconfig.clone(),
    }
}

/// Build the controller context, cancelling in-flight waits on Ctrl-C
///
/// Also returns the garden client for watching Shoots.
async fn build_context(
    kubeconfigs: &Kubeconfigs,
    config: ReconcilerConfig,
) -> anyhow::Result<(Arc<Context>, Client)> {
    let garden = create_client(kubeconfigs.garden.as_deref()).await?;
    let seed = create_client(kubeconfigs.seed.as_deref()).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received interrupt, cancelling in-flight waits");
            on_signal.cancel();
        }
    });

    let ctx = Context::builder(garden.clone(), seed)
        .config(config)
        .cancel(cancel)
        .build();
    Ok((Arc::new(ctx), garden))
}

/// Deploy one shoot's Infrastructure
async fn run_deploy(
    kubeconfigs: &Kubeconfigs,
    config: ReconcilerConfig,
    args: ShootArgs,
) -> anyhow::Result<()> {
    let (ctx, _) = build_context(kubeconfigs, config).await?;
    let shoot = ctx.garden.get_shoot(&args.namespace, &args.name).await?;

    let ranges = deploy_shoot(&shoot, &ctx).await?;
    tracing::info!(shoot = %args.name, ?ranges, "Infrastructure deployed");
    Ok(())
}

/// Destroy one shoot's Infrastructure
async fn run_destroy(
    kubeconfigs: &Kubeconfigs,
    config: ReconcilerConfig,
    args: ShootArgs,
) -> anyhow::Result<()> {
    let (ctx, _) = build_context(kubeconfigs, config).await?;
    let shoot = ctx.garden.get_shoot(&args.namespace, &args.name).await?;

    destroy_shoot(&shoot, &ctx).await?;
    tracing::info!(shoot = %args.name, "Infrastructure destroyed");
    Ok(())
}

/// Run the Shoot controller until shutdown
async fn run_controller(kubeconfigs: &Kubeconfigs, config: ReconcilerConfig) -> anyhow::Result<()> {
    tracing::info!("infra-reconciler controller starting...");

    let (ctx, garden) = build_context(kubeconfigs, config).await?;
    let shoots: Api<Shoot> = Api::all(garden);

    Controller::new(shoots, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Shoot reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Shoot reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("infra-reconciler controller stopped");
    Ok(())
}
