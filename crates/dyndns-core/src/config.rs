//! Configuration types for the dyndns system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Default IP-echo endpoint
pub const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org";

/// Main dyndns configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DyndnsConfig {
    /// The single record this process manages
    pub record: RecordConfig,

    /// Public IP source settings
    #[serde(default)]
    pub ip_source: IpSourceConfig,

    /// Startup reconciliation settings
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DyndnsConfig {
    /// Create a configuration for `host` in `domain` with defaults elsewhere
    pub fn new(host: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            record: RecordConfig::new(host, domain),
            ip_source: IpSourceConfig::default(),
            reconcile: ReconcileConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.record.validate()?;
        self.ip_source.validate()?;

        if self.engine.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        Ok(())
    }
}

/// DNS record configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Record host label (e.g., "home")
    pub host: String,

    /// DNS domain containing the record (e.g., "example.com")
    pub domain: String,
}

impl RecordConfig {
    /// Create a new record configuration
    pub fn new(host: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            domain: domain.into(),
        }
    }

    /// Fully-qualified name of the record, always with one trailing dot
    pub fn fqdn(&self) -> String {
        let domain = self.domain.trim_end_matches('.');
        format!("{}.{}.", self.host, domain)
    }

    /// Validate host and domain
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config("host is a required parameter"));
        }
        if self.domain.is_empty() {
            return Err(crate::Error::config("domain is a required parameter"));
        }

        // The host may itself be dotted ("home.lab"), so it is checked as a name.
        validate_domain_name(&self.host)?;
        validate_domain_name(self.domain.trim_end_matches('.'))?;

        let fqdn = self.fqdn();
        if fqdn.len() > 254 {
            return Err(crate::Error::config(format!(
                "Record name too long: {} chars (max 253). Got: {}",
                fqdn.len() - 1,
                fqdn
            )));
        }

        Ok(())
    }
}

/// Validate that a string is a valid domain name
///
/// Basic DNS name validation per RFC 1035. Not comprehensive, but catches
/// common mistakes.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{domain}'"
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{label}'. \
                Valid: alphanumeric and hyphen only."
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{label}'"
            )));
        }
    }

    Ok(())
}

/// Public IP source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpSourceConfig {
    /// IP-echo endpoint returning the caller's address as plain text
    #[serde(default = "default_ip_echo_url")]
    pub url: String,

    /// Seconds between two samples
    ///
    /// Keep this modest in production: echo services rate-limit aggressive
    /// clients.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl IpSourceConfig {
    /// Validate the IP source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("IP echo URL cannot be empty"));
        }
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "IP echo URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.interval_secs == 0 {
            return Err(crate::Error::config("IP source interval must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("IP source timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for IpSourceConfig {
    fn default() -> Self {
        Self {
            url: default_ip_echo_url(),
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_ip_echo_url() -> String {
    DEFAULT_IP_ECHO_URL.to_string()
}

fn default_interval_secs() -> u64 {
    4
}

fn default_timeout_secs() -> u64 {
    10
}

/// What reconciliation does when a name has several addresses on record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Warn and compare against the first address
    #[default]
    UseFirst,
    /// Treat the inconsistency as a fatal startup error
    Fail,
}

/// Startup reconciliation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Policy for ambiguous lookups
    #[serde(default)]
    pub on_ambiguous: AmbiguityPolicy,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the monitor → dispatcher channel
    ///
    /// The default of 1 makes every send a handoff: the monitor waits until
    /// the dispatcher has taken the previous event.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fqdn_has_single_trailing_dot() {
        assert_eq!(RecordConfig::new("home", "example.com").fqdn(), "home.example.com.");
        assert_eq!(RecordConfig::new("home", "example.com.").fqdn(), "home.example.com.");
    }

    #[test]
    fn defaults_validate() {
        let config = DyndnsConfig::new("home", "example.com");
        assert!(config.validate().is_ok());
        assert_eq!(config.ip_source.interval_secs, 4);
        assert_eq!(config.ip_source.url, DEFAULT_IP_ECHO_URL);
        assert_eq!(config.reconcile.on_ambiguous, AmbiguityPolicy::UseFirst);
    }

    #[test]
    fn missing_host_or_domain_is_rejected() {
        let err = DyndnsConfig::new("", "example.com").validate().unwrap_err();
        assert!(err.to_string().contains("host"));

        let err = DyndnsConfig::new("home", "").validate().unwrap_err();
        assert!(err.to_string().contains("domain"));
    }

    #[test]
    fn bad_labels_are_rejected() {
        assert!(validate_domain_name("-bad.example.com").is_err());
        assert!(validate_domain_name("bad-.example.com").is_err());
        assert!(validate_domain_name("a..example.com").is_err());
        assert!(validate_domain_name("under_score.example.com").is_err());
        assert!(validate_domain_name(&"a".repeat(64)).is_err());
        assert!(validate_domain_name("home.example.com").is_ok());
    }

    #[test]
    fn ip_source_rejects_bad_settings() {
        let mut config = DyndnsConfig::new("home", "example.com");
        config.ip_source.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = DyndnsConfig::new("home", "example.com");
        config.ip_source.url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn ambiguity_policy_uses_kebab_case() {
        let json = serde_json::to_string(&AmbiguityPolicy::UseFirst).unwrap();
        assert_eq!(json, "\"use-first\"");
        let parsed: AmbiguityPolicy = serde_json::from_str("\"fail\"").unwrap();
        assert_eq!(parsed, AmbiguityPolicy::Fail);
    }
}
