//! infra-reconciler - drives Infrastructure extension resources for Shoot clusters
//!
//! The reconciler writes the desired state of a shoot's provider infrastructure
//! into an `Infrastructure` object in the seed cluster, waits for an
//! out-of-process extension controller to converge it, projects the published
//! provider status back into the shoot, and restricts the shoot API server's
//! load balancer to the resulting source ranges.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (Infrastructure, Shoot)
//! - [`extension`] - Generic create-or-update, readiness and deletion primitives
//! - [`infrastructure`] - Infrastructure deploy/wait/destroy flows, status and firewall
//! - [`wait`] - Bounded, cancellable convergence polling
//! - [`client`] - Garden and seed cluster access
//! - [`controller`] - Shoot controller reconciliation logic
//! - [`config`] - Reconciler configuration
//! - [`error`] - Error types for the reconciler

#![deny(missing_docs)]

use std::time::Duration;

pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod extension;
pub mod infrastructure;
pub mod wait;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Annotations
// =============================================================================

/// Annotation asking an extension controller to act on a resource
pub const ANNOTATION_OPERATION: &str = "gardener.cloud/operation";

/// Value of [`ANNOTATION_OPERATION`] requesting a reconciliation
pub const OPERATION_RECONCILE: &str = "reconcile";

/// Annotation an extension controller requires before it honours a delete
pub const ANNOTATION_CONFIRM_DELETION: &str = "confirmation.gardener.cloud/deletion";

/// Comma-separated list of tasks requested for the next shoot reconciliation
pub const ANNOTATION_SHOOT_TASKS: &str = "shoot.gardener.cloud/tasks";

/// Shoot task forcing an Infrastructure reconciliation
pub const TASK_DEPLOY_INFRASTRUCTURE: &str = "deployInfrastructure";

// =============================================================================
// Seed resources
// =============================================================================

/// Prefix of every shoot's namespace in the seed cluster
pub const SEED_NAMESPACE_PREFIX: &str = "shoot--";

/// Secret holding the cloud provider credentials in the seed namespace
pub const SECRET_NAME_CLOUD_PROVIDER: &str = "cloudprovider";

/// Secret holding the shoot's SSH key pair in the seed namespace
pub const SECRET_NAME_SSH_KEYPAIR: &str = "ssh-keypair";

/// Data key of the public key in [`SECRET_NAME_SSH_KEYPAIR`]
pub const DATA_KEY_SSH_AUTHORIZED_KEYS: &str = "id_rsa.pub";

/// Service fronting the shoot API server in the seed namespace
pub const APISERVER_SERVICE_NAME: &str = "kube-apiserver";

/// Namespace of the ConfigMap listing the seed's egress IPs
pub const OUTBOUND_IPS_CONFIGMAP_NAMESPACE: &str = "kube-system";

/// ConfigMap listing the seed's egress IPs
pub const OUTBOUND_IPS_CONFIGMAP_NAME: &str = "vpc-outbound-ips";

/// Key holding the space-delimited IP list in [`OUTBOUND_IPS_CONFIGMAP_NAME`]
pub const OUTBOUND_IPS_CONFIGMAP_KEY: &str = "ips";

/// Source range opening a load balancer to every client
pub const ALLOW_ALL_CIDR: &str = "0.0.0.0/0";

/// Provider type of Amazon Web Services
pub const PROVIDER_AWS: &str = "aws";

/// Field manager used for every write
pub const FIELD_MANAGER: &str = "infra-reconciler";

// =============================================================================
// Timing
// =============================================================================

/// Default interval between two observations of an extension resource
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default time to wait for an Infrastructure to become ready or disappear
pub const INFRASTRUCTURE_DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default requeue period of a healthy shoot
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(10 * 60);
