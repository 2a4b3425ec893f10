// # DNS Backend Trait
//
// Defines the narrow interface the core needs from a managed DNS provider.
//
// ## Implementations
//
// - Cloudflare: `dyndns-provider-cloudflare` crate
// - In-memory: `dyndns_core::backend::MemoryDnsBackend`
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::DnsBackend;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let backend = /* DnsBackend implementation */;
//
//     let zone_id = backend.resolve_zone("example.com.").await?;
//     backend
//         .upsert("home.example.com.", &zone_id, std::net::Ipv4Addr::new(192, 0, 2, 1))
//         .await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};

/// TTL advertised for every record the system writes
pub const RECORD_TTL_SECS: u32 = 60;

/// Record type written by the system
pub const RECORD_TYPE: &str = "A";

/// Trait for DNS backend implementations
///
/// # Contract
///
/// - Backends are stateless: nothing is cached between calls and every upsert
///   is authoritative.
/// - Backends never retry. Failures are returned and the caller decides.
/// - `upsert` is idempotent: after any number of calls with the same address
///   the name carries exactly one `A` value with TTL [`RECORD_TTL_SECS`].
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait DnsBackend: Send + Sync {
    /// Resolve the hosted zone identifier for a domain
    ///
    /// # Errors
    ///
    /// `Error::ZoneNotFound` if no hosted zone matches `domain`.
    async fn resolve_zone(&self, domain: &str) -> Result<String, crate::Error>;

    /// Ask the system resolver for every address of `fqdn`
    ///
    /// Used by the default [`lookup_record`](DnsBackend::lookup_record).
    async fn resolve_addresses(&self, fqdn: &str) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((fqdn.trim_end_matches('.'), 0)).await?;
        Ok(addrs.map(|sock| sock.ip()).collect())
    }

    /// Look up the address currently on record for `fqdn`
    ///
    /// The default implementation asks the system resolver, which is how the
    /// rest of the internet sees the record.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: the name does not resolve to any IPv4 address
    /// - `Error::AmbiguousRecord`: more than one address is on record; the
    ///   error carries the first one
    /// - `Error::Network`: the resolver could not give a definitive answer
    async fn lookup_record(&self, fqdn: &str) -> Result<Ipv4Addr, crate::Error> {
        let addrs = self
            .resolve_addresses(fqdn)
            .await
            .map_err(|e| resolver_error(fqdn, &e))?;

        first_ipv4(fqdn, &addrs)
    }

    /// Create or replace the `A` record for `fqdn` in `zone_id`
    ///
    /// # Errors
    ///
    /// `Error::Backend` carrying the underlying cause.
    async fn upsert(&self, fqdn: &str, zone_id: &str, ip: Ipv4Addr) -> Result<(), crate::Error>;

    /// Get the backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}

/// Resolver messages meaning the name has no address at all
const NO_ANSWER_MESSAGES: &[&str] = &[
    "Name or service not known",           // EAI_NONAME (glibc)
    "No address associated with hostname", // EAI_NODATA (glibc)
    "nodename nor servname provided",      // EAI_NONAME (BSD, macOS)
    "No such host is known",               // WSAHOST_NOT_FOUND
];

/// Classify a system resolver failure
///
/// Only a definitive "no such name" or "no data" answer means the record is
/// missing. Every other failure is a network error.
pub fn resolver_error(fqdn: &str, err: &std::io::Error) -> crate::Error {
    let message = err.to_string();
    let no_answer = err.kind() == std::io::ErrorKind::NotFound
        || NO_ANSWER_MESSAGES.iter().any(|m| message.contains(m));

    if no_answer {
        crate::Error::not_found(format!("{fqdn}: {message}"))
    } else {
        crate::Error::network(format!("cannot resolve {fqdn}: {message}"))
    }
}

/// Reduce a resolver answer to a single IPv4 address
///
/// IPv6 answers and repeated addresses are ignored. An empty answer is `NotFound`; several IPv4
/// answers are `AmbiguousRecord` carrying the first one.
pub fn first_ipv4(fqdn: &str, addrs: &[IpAddr]) -> Result<Ipv4Addr, crate::Error> {
    let mut v4: Vec<Ipv4Addr> = Vec::new();
    for addr in addrs {
        if let IpAddr::V4(ip) = addr
            && !v4.contains(ip)
        {
            v4.push(*ip);
        }
    }

    match v4.as_slice() {
        [] => Err(crate::Error::not_found(format!("{fqdn} has no A record"))),
        [only] => Ok(*only),
        [first, ..] => Err(crate::Error::ambiguous(fqdn, *first, v4.len())),
    }
}
