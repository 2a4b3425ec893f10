//! Error types for the dyndns system
//!
//! Startup errors (`Config`, `ZoneNotFound`) are fatal to the daemon; every
//! other variant is expected during steady-state operation and is logged by
//! the component that observes it.

use std::net::Ipv4Addr;
use thiserror::Error;

/// Result type alias for dyndns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dyndns system
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure talking to a remote service
    #[error("Network error: {0}")]
    Network(String),

    /// The response arrived but its body could not be read
    #[error("Read error: {0}")]
    Read(String),

    /// A response body did not contain a usable IPv4 address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// No hosted zone matches the configured domain
    #[error("Hosted zone not found: {0}")]
    ZoneNotFound(String),

    /// The record does not exist yet
    #[error("Record not found: {0}")]
    NotFound(String),

    /// More than one address is on record for a single name
    #[error("{fqdn} has {count} addresses on record (first: {first})")]
    AmbiguousRecord {
        /// The name that was looked up
        fqdn: String,
        /// First address returned for the name
        first: Ipv4Addr,
        /// Total number of addresses returned
        count: usize,
    },

    /// A DNS backend rejected or failed an operation
    #[error("Backend error ({backend}): {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a body-read error
    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    /// Create an invalid address error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    /// Create a "zone not found" error
    pub fn zone_not_found(domain: impl Into<String>) -> Self {
        Self::ZoneNotFound(domain.into())
    }

    /// Create a "record not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an ambiguous record error
    pub fn ambiguous(fqdn: impl Into<String>, first: Ipv4Addr, count: usize) -> Self {
        Self::AmbiguousRecord {
            fqdn: fqdn.into(),
            first,
            count,
        }
    }

    /// Create a backend error
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Whether the failure may resolve on its own by waiting
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Read(_) | Self::InvalidAddress(_) | Self::Backend { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_message_names_first_address() {
        let err = Error::ambiguous("home.example.com.", Ipv4Addr::new(1, 2, 3, 4), 2);
        let msg = err.to_string();
        assert!(msg.contains("home.example.com."));
        assert!(msg.contains("1.2.3.4"));
        assert!(msg.contains('2'));
    }

    #[test]
    fn transient_classification() {
        assert!(Error::network("connection reset").is_transient());
        assert!(Error::backend("memory", "boom").is_transient());
        assert!(!Error::config("missing host").is_transient());
        assert!(!Error::zone_not_found("example.com.").is_transient());
    }
}
