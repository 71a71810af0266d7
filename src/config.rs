//! Reconciler configuration
//!
//! All settings have defaults, so an absent config file yields a working
//! configuration. The config is passed explicitly to every reconciliation
//! through the controller [`Context`](crate::controller::Context); nothing in
//! here is process-global.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    APISERVER_SERVICE_NAME, DEFAULT_POLL_INTERVAL, DEFAULT_RESYNC_PERIOD,
    INFRASTRUCTURE_DEFAULT_TIMEOUT, OUTBOUND_IPS_CONFIGMAP_KEY, OUTBOUND_IPS_CONFIGMAP_NAME,
    OUTBOUND_IPS_CONFIGMAP_NAMESPACE,
};
use crate::{Error, Result};

/// Top-level reconciler configuration
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcilerConfig {
    /// Seconds between two observations of an extension resource
    pub poll_interval_secs: u64,

    /// Seconds to wait for the Infrastructure to become ready or disappear
    pub infrastructure_timeout_secs: u64,

    /// Seconds between two reconciliations of a healthy shoot
    pub resync_period_secs: u64,

    /// API server firewall settings
    pub firewall: FirewallConfig,

    /// Per-component override values
    pub value_overrides: ValueOverrides,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            infrastructure_timeout_secs: INFRASTRUCTURE_DEFAULT_TIMEOUT.as_secs(),
            resync_period_secs: DEFAULT_RESYNC_PERIOD.as_secs(),
            firewall: FirewallConfig::default(),
            value_overrides: ValueOverrides::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Load the configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Parse the configuration from YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::config("pollIntervalSecs must be at least 1"));
        }
        if self.infrastructure_timeout_secs < self.poll_interval_secs {
            return Err(Error::config(
                "infrastructureTimeoutSecs must not be shorter than pollIntervalSecs",
            ));
        }
        Ok(())
    }

    /// Interval and timeout used for Infrastructure waits
    pub fn infrastructure_wait(&self) -> WaitOptions {
        WaitOptions {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.infrastructure_timeout_secs),
        }
    }

    /// Requeue period for a healthy shoot
    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_period_secs)
    }
}

/// Poll interval and overall budget of a wait
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitOptions {
    /// Time between two observations
    pub interval: Duration,
    /// Maximum time to wait
    pub timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: INFRASTRUCTURE_DEFAULT_TIMEOUT,
        }
    }
}

/// Settings for the API server load balancer firewall
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FirewallConfig {
    /// Namespace of the ConfigMap listing seed egress IPs
    pub outbound_ips_namespace: String,

    /// Name of the ConfigMap listing seed egress IPs
    pub outbound_ips_name: String,

    /// Key holding the space-delimited IP list
    pub outbound_ips_key: String,

    /// Name of the API server Service in the seed namespace
    pub apiserver_service: String,

    /// Refuse to open the load balancer to 0.0.0.0/0 when a shoot declares no ranges
    pub require_explicit_source_ranges: bool,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            outbound_ips_namespace: OUTBOUND_IPS_CONFIGMAP_NAMESPACE.to_string(),
            outbound_ips_name: OUTBOUND_IPS_CONFIGMAP_NAME.to_string(),
            outbound_ips_key: OUTBOUND_IPS_CONFIGMAP_KEY.to_string(),
            apiserver_service: APISERVER_SERVICE_NAME.to_string(),
            require_explicit_source_ranges: false,
        }
    }
}

/// Override values keyed by component name
///
/// Each entry is expected to be a map; anything else is ignored on lookup.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ValueOverrides(BTreeMap<String, serde_json::Value>);

impl ValueOverrides {
    /// Create overrides from a component → values map
    pub fn new(values: BTreeMap<String, serde_json::Value>) -> Self {
        Self(values)
    }

    /// Override values for `component`, or an empty map
    pub fn values_for(&self, component: &str) -> serde_json::Map<String, serde_json::Value> {
        match self.0.get(component) {
            Some(serde_json::Value::Object(values)) => values.clone(),
            _ => serde_json::Map::new(),
        }
    }

    /// Returns true if no component has overrides
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
