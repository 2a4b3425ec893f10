//! Core traits for the dyndns system
//!
//! - [`IpSource`]: Ask for the current public address
//! - [`DnsBackend`]: Resolve zones, read and upsert records at a DNS provider

pub mod ip_source;
pub mod dns_backend;

pub use ip_source::{IpSource, IpChangeEvent};
pub use dns_backend::{DnsBackend, RECORD_TTL_SECS, RECORD_TYPE, first_ipv4, resolver_error};
