// # HTTP IP Source
//
// This crate provides the public IP source for the dyndns system.
//
// ## Architecture
//
// Each call to `current()` performs one GET against an IP-echo service
// (e.g., api.ipify.org, icanhazip.com) and parses the plain-text body as an
// IPv4 address. Polling, change detection and retry-by-waiting belong to
// `dyndns_core::IpChangeMonitor`, not to this crate.

use dyndns_core::config::IpSourceConfig;
use dyndns_core::traits::IpSource;
use dyndns_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Known plain-text IP-echo services
pub const KNOWN_ECHO_SERVICES: &[&str] = &[
    "https://api.ipify.org",  // returns plain text IP
    "https://ifconfig.me/ip", // No rate limit documented
    "https://icanhazip.com",  // No rate limit documented
];

/// Whether `url` is one of [`KNOWN_ECHO_SERVICES`]
///
/// A trailing slash is ignored.
pub fn is_known_echo_service(url: &str) -> bool {
    let url = url.trim_end_matches('/');
    KNOWN_ECHO_SERVICES.contains(&url)
}

/// HTTP-based public IP source
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    /// URL to fetch IP from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source with the default timeout
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch IP from (e.g., "https://api.ipify.org")
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create with a custom request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Create from configuration
    pub fn from_config(config: &IpSourceConfig) -> Result<Self> {
        config.validate()?;
        Self::with_timeout(config.url.clone(), Duration::from_secs(config.timeout_secs))
    }

    /// The endpoint this source queries
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Parse an IP-echo response body
///
/// Surrounding whitespace is ignored. An IPv6 answer is rejected since only
/// `A` records are managed.
pub fn parse_echo_body(body: &str) -> Result<Ipv4Addr> {
    let text = body.trim();
    match text.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Ok(ip),
        Ok(IpAddr::V6(ip)) => Err(Error::invalid_address(format!("Expected IPv4, got: {ip}"))),
        Err(_) => Err(Error::invalid_address(format!("Invalid IP address: {text:?}"))),
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::network(format!("Request to {} failed: {e}", self.url)))?;

        if !response.status().is_success() {
            return Err(Error::network(format!(
                "{} answered HTTP {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::read(format!("Failed to read response from {}: {e}", self.url)))?;

        let ip = parse_echo_body(&body)?;
        tracing::debug!(url = %self.url, ip = %ip, "Fetched public IP");
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
