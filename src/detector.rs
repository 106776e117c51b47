//! Public IP detection.
//!
//! IPv4 comes from a remote echo service, IPv6 from the local interface
//! configuration. Either one may be unavailable; a failed attempt is logged
//! and reported as `None`, it is never retried within a run.

use crate::config::DEFAULT_IPV4_SERVICE_URL;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tokio::process::Command;

/// Bound on each discovery call.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of the addresses a run wants recorded.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Externally visible IPv4 address.
    async fn discover_ipv4(&self) -> Option<Ipv4Addr>;

    /// Locally assigned global-scope IPv6 address.
    async fn discover_ipv6(&self) -> Option<Ipv6Addr>;
}

#[derive(Debug, Deserialize)]
struct EchoResponse {
    ip: String,
}

/// IP detector backed by an echo service and `ip(8)`.
pub struct IpDetector {
    client: reqwest::Client,
    ipv4_service: String,
}

impl IpDetector {
    /// Create a new IP detector with the default echo service.
    pub fn new() -> Self {
        Self::with_service(DEFAULT_IPV4_SERVICE_URL.to_string())
    }

    /// Create a new IP detector with a custom echo service.
    pub fn with_service(ipv4_service: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DISCOVERY_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            ipv4_service,
        }
    }

    async fn fetch_ipv4(&self) -> Result<Ipv4Addr> {
        let response = self.client.get(&self.ipv4_service).send().await?;

        if !response.status().is_success() {
            return Err(DdnsError::IpDetection(format!(
                "HTTP {} from {}",
                response.status(),
                self.ipv4_service
            )));
        }

        let body: EchoResponse = response.json().await?;
        match body.ip.trim().parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => Ok(ip),
            Ok(IpAddr::V6(ip)) => Err(DdnsError::IpDetection(format!(
                "echo service answered with IPv6 address {}",
                ip
            ))),
            Err(_) => Err(DdnsError::IpDetection(format!(
                "Invalid IP response: {}",
                body.ip
            ))),
        }
    }

    async fn query_interfaces(&self) -> Result<Ipv6Addr> {
        let output = tokio::time::timeout(
            DISCOVERY_TIMEOUT,
            Command::new("ip")
                .args(["-6", "addr", "show", "scope", "global", "-deprecated"])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| DdnsError::IpDetection("`ip -6 addr` timed out".to_string()))??;

        if !output.status.success() {
            return Err(DdnsError::IpDetection(format!(
                "`ip -6 addr` exited with {}",
                output.status
            )));
        }

        parse_ip_addr_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            DdnsError::IpDetection("no global-scope IPv6 address found".to_string())
        })
    }
}

impl Default for IpDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressSource for IpDetector {
    async fn discover_ipv4(&self) -> Option<Ipv4Addr> {
        match self.fetch_ipv4().await {
            Ok(ip) => {
                tracing::debug!("Detected IPv4 {} from {}", ip, self.ipv4_service);
                Some(ip)
            }
            Err(e) => {
                tracing::warn!("IPv4 unavailable: {}", e);
                None
            }
        }
    }

    async fn discover_ipv6(&self) -> Option<Ipv6Addr> {
        match self.query_interfaces().await {
            Ok(ip) => {
                tracing::debug!("Detected IPv6 {}", ip);
                Some(ip)
            }
            Err(e) => {
                tracing::warn!("IPv6 unavailable: {}", e);
                None
            }
        }
    }
}

/// Pick the first usable global-scope address out of `ip -6 addr show`
/// output. Temporary and permanent addresses are treated alike.
pub fn parse_ip_addr_output(output: &str) -> Option<Ipv6Addr> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("inet6 "))
        .filter(|line| {
            let flags: Vec<&str> = line.split_whitespace().collect();
            flags.windows(2).any(|w| w == ["scope", "global"])
                && !flags.contains(&"deprecated")
                && !flags.contains(&"tentative")
        })
        .filter_map(|line| {
            let cidr = line.split_whitespace().nth(1)?;
            let addr = cidr.split('/').next()?;
            addr.parse::<Ipv6Addr>().ok()
        })
        .next()
}
