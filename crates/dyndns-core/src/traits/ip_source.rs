// # IP Source Trait
//
// Defines the interface for asking "what is my public address right now?".
//
// ## Implementations
//
// - HTTP IP-echo services: `dyndns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//     let ip = source.current().await?;
//     println!("public address: {ip}");
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;

/// A detected transition of the public address
///
/// Produced once per transition by the
/// [`IpChangeMonitor`](crate::monitor::IpChangeMonitor) and moved into the
/// dispatcher through the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpChangeEvent {
    /// When the transition was observed
    pub timestamp: DateTime<Utc>,
    /// The previously known address, `None` if the monitor started without one
    pub previous_ip: Option<Ipv4Addr>,
    /// The newly observed address
    pub new_ip: Ipv4Addr,
}

impl IpChangeEvent {
    /// Create a new IP change event stamped with the current time
    pub fn new(new_ip: Ipv4Addr, previous_ip: Option<Ipv4Addr>) -> Self {
        Self::at(Utc::now(), new_ip, previous_ip)
    }

    /// Create an event with an explicit timestamp
    pub fn at(timestamp: DateTime<Utc>, new_ip: Ipv4Addr, previous_ip: Option<Ipv4Addr>) -> Self {
        Self {
            timestamp,
            previous_ip,
            new_ip,
        }
    }
}

/// Trait for public IP source implementations
///
/// A source performs exactly one lookup per call. It keeps no state between
/// calls and never retries: retry-by-waiting is the monitor's job.
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the current public IPv4 address
    ///
    /// # Errors
    ///
    /// - `Error::Network`: transport failure or non-success status
    /// - `Error::Read`: the response body could not be read
    /// - `Error::InvalidAddress`: the body is not an IPv4 address
    async fn current(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Get the source name (for logging)
    fn source_name(&self) -> &'static str;
}
