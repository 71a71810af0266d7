//! API server load balancer firewall
//!
//! The `kube-apiserver` Service of a shoot gets its
//! `spec.loadBalancerSourceRanges` replaced by the synthesized allow-list on
//! every reconciliation.

use std::net::IpAddr;

use tracing::{info, warn};

use super::status::worker_public_ips;
use super::ShootState;
use crate::client::SeedClient;
use crate::config::FirewallConfig;
use crate::{Error, Result, ALLOW_ALL_CIDR};

/// Exact host range of `ip`, or `None` if it is not an IP address
fn host_range(ip: &str) -> Option<String> {
    match ip.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => Some(format!("{v4}/32")),
        IpAddr::V6(v6) => Some(format!("{v6}/128")),
    }
}

fn push_hosts<'a>(ranges: &mut Vec<String>, ips: impl IntoIterator<Item = &'a str>, source: &str) {
    for ip in ips {
        match host_range(ip) {
            Some(range) => ranges.push(range),
            None => warn!(ip, source, "skipping invalid IP address"),
        }
    }
}

/// Synthesize the load balancer source ranges of a shoot
///
/// Declared ranges are kept and extended with the seed's outbound IPs; with
/// nothing declared the list opens to `0.0.0.0/0` unless
/// `require_explicit` is set. Worker IPs are always appended.
pub fn synthesize_source_ranges(
    declared: &[String],
    outbound_ips: Option<&str>,
    worker_ips: &[String],
    require_explicit: bool,
) -> Result<Vec<String>> {
    let mut ranges = declared.to_vec();

    if ranges.is_empty() {
        if require_explicit {
            return Err(Error::validation(
                "shoot declares no load balancer source ranges",
            ));
        }
        ranges.push(ALLOW_ALL_CIDR.to_string());
    } else if let Some(ips) = outbound_ips {
        push_hosts(&mut ranges, ips.split_whitespace(), "seed outbound IPs");
    }

    push_hosts(
        &mut ranges,
        worker_ips.iter().map(String::as_str),
        "worker NAT IPs",
    );
    Ok(ranges)
}

/// Replace the API server Service's load balancer source ranges
///
/// Returns the ranges written.
pub async fn deploy_apiserver_firewall(
    seed: &dyn SeedClient,
    state: &ShootState,
    config: &FirewallConfig,
) -> Result<Vec<String>> {
    let declared = &state.shoot.spec.load_balancer_source_ranges;

    let outbound_ips = if declared.is_empty() {
        None
    } else {
        seed.get_config_map(&config.outbound_ips_namespace, &config.outbound_ips_name)
            .await?
            .and_then(|cm| cm.data)
            .and_then(|mut data| data.remove(&config.outbound_ips_key))
    };

    let workers = worker_public_ips(state)?;
    let ranges = synthesize_source_ranges(
        declared,
        outbound_ips.as_deref(),
        &workers,
        config.require_explicit_source_ranges,
    )?;

    let mut service = seed
        .get_service(&state.seed_namespace, &config.apiserver_service)
        .await?;
    service
        .spec
        .get_or_insert_with(Default::default)
        .load_balancer_source_ranges = Some(ranges.clone());
    seed.replace_service(&state.seed_namespace, &service).await?;

    info!(
        namespace = %state.seed_namespace,
        ranges = ?ranges,
        "updated api server source ranges"
    );
    Ok(ranges)
}
